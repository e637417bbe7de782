//! System microphone access via CPAL.
//!
//! Each calibration or listen opens its own input stream, so nothing is
//! recorded while the worker is busy recognizing a phrase.

use super::dispatch::FrameDispatcher;
use super::listen::{listen_frames, FrameEvent, ListenLimits, ListenOutcome};
use super::meter::{rms_db, LiveMeter, METER_FLOOR_DB};
use super::resample::resample_to_target_rate;
use super::AudioSource;
use crate::config::LISTEN_FRAME_MS;
use crate::log_debug;
use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Frames buffered between the cpal callback and the worker.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
    meter: Option<LiveMeter>,
}

impl Recorder {
    /// List microphone names for `--list-input-devices`.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    /// Open the named input, or the system default when `preferred_device` is `None`.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self {
            device,
            meter: None,
        })
    }

    /// Mirror every frame's level into `meter`.
    pub fn with_meter(mut self, meter: LiveMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Record `window` of mono audio at the device rate.
    pub fn record_for(&self, window: Duration) -> Result<Vec<f32>> {
        let stream = self.open_frame_stream(LISTEN_FRAME_MS)?;
        let deadline = Instant::now() + window;
        let mut samples = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match stream.frames.recv_timeout(deadline - now) {
                Ok(frame) => samples.extend(frame),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => bail!("audio stream disconnected"),
            }
        }
        stream.finish();

        if samples.is_empty() {
            return Err(self.no_samples_error());
        }
        Ok(samples)
    }

    fn open_frame_stream(&self, frame_ms: u64) -> Result<FrameStream> {
        let default_config = self.device.default_input_config()?;
        let format = default_config.sample_format();
        let config: StreamConfig = default_config.into();
        let sample_rate = config.sample_rate.0;
        let channels = usize::from(config.channels.max(1));
        let frame_samples = ((u64::from(sample_rate) * frame_ms.max(1)) / 1000).max(1) as usize;

        log_debug(&format!(
            "Recorder stream: format={format:?} sample_rate={sample_rate}Hz channels={channels} frame_samples={frame_samples}"
        ));

        let (sender, frames) = bounded::<Vec<f32>>(FRAME_CHANNEL_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            frame_samples,
            sender,
            dropped.clone(),
        )));

        let stream = match format {
            SampleFormat::F32 => {
                self.build_stream::<f32>(&config, channels, dispatcher, &dropped, |s| s)?
            }
            SampleFormat::I16 => self.build_stream::<i16>(
                &config,
                channels,
                dispatcher,
                &dropped,
                |s| s as f32 / 32_768.0,
            )?,
            SampleFormat::U16 => self.build_stream::<u16>(
                &config,
                channels,
                dispatcher,
                &dropped,
                |s| (s as f32 - 32_768.0) / 32_768.0,
            )?,
            other => bail!("unsupported sample format: {other:?}"),
        };
        stream.play()?;

        Ok(FrameStream {
            stream,
            frames,
            dropped,
            sample_rate,
        })
    }

    fn build_stream<T>(
        &self,
        config: &StreamConfig,
        channels: usize,
        dispatcher: Arc<Mutex<FrameDispatcher>>,
        dropped: &Arc<AtomicUsize>,
        convert: fn(T) -> f32,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + Copy + 'static,
    {
        let dropped = dropped.clone();
        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));
        let stream = self.device.build_input_stream(
            config,
            move |data: &[T], _| {
                // The callback thread must never wait on the worker.
                if let Ok(mut pump) = dispatcher.try_lock() {
                    pump.push(data, channels, convert);
                } else {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    fn no_samples_error(&self) -> anyhow::Error {
        anyhow!(
            "no samples captured from '{}'; check microphone permissions and availability. {}",
            self.device_name(),
            mic_permission_hint()
        )
    }
}

impl AudioSource for Recorder {
    fn ambient_db(&mut self, window: Duration) -> Result<f32> {
        let level = rms_db(&self.record_for(window)?);
        if let Some(ref meter) = self.meter {
            meter.set_db(level);
        }
        Ok(level)
    }

    fn listen(&mut self, threshold_db: f32, limits: &ListenLimits) -> Result<ListenOutcome> {
        let stream = self.open_frame_stream(limits.frame_ms)?;
        let wait = Duration::from_millis(limits.frame_ms.max(1));
        let outcome = listen_frames(
            || match stream.frames.recv_timeout(wait) {
                Ok(frame) => FrameEvent::Frame(frame),
                Err(RecvTimeoutError::Timeout) => FrameEvent::Gap,
                Err(RecvTimeoutError::Disconnected) => FrameEvent::Closed,
            },
            threshold_db,
            stream.sample_rate,
            limits,
            self.meter.as_ref(),
        );
        let sample_rate = stream.sample_rate;
        stream.finish();
        if let Some(ref meter) = self.meter {
            meter.set_db(METER_FLOOR_DB);
        }

        match outcome? {
            ListenOutcome::Phrase {
                audio,
                speech_ms,
                stop,
            } => Ok(ListenOutcome::Phrase {
                audio: resample_to_target_rate(&audio, sample_rate),
                speech_ms,
                stop,
            }),
            ListenOutcome::TimedOut => Ok(ListenOutcome::TimedOut),
        }
    }

    fn name(&self) -> String {
        self.device_name()
    }
}

/// A running input stream cut into fixed-size mono frames.
struct FrameStream {
    stream: cpal::Stream,
    frames: Receiver<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl FrameStream {
    fn finish(self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            log_debug(&format!("audio frames dropped: {dropped}"));
        }
    }
}

pub(crate) fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
