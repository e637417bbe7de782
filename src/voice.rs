//! Background worker that listens for spoken commands.
//!
//! A single long-lived thread loops calibrate, listen, recognize and pushes
//! lower-cased utterances into the command queue. It never touches game
//! state, and every audio or recognizer failure stays on this side of the
//! queue: the game loop only ever sees strings.

use crate::audio::{speech_threshold_db, AudioSource, ListenLimits, ListenOutcome, LiveMeter};
use crate::config::VoiceSettings;
use crate::queue::{CommandProducer, PushOutcome};
use crate::stt::{sanitize_transcript, RecognizeError, Recognizer};
use crate::{lock_or_recover, log_debug, log_debug_content};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep while backing off, so a stop request is seen quickly.
const STOP_POLL_SLICE: Duration = Duration::from_millis(25);

/// What the worker is doing right now, for the status line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerPhase {
    #[default]
    Starting,
    Calibrating,
    Listening,
    Recognizing,
    BackingOff,
    Stopped,
}

impl WorkerPhase {
    pub fn label(self) -> &'static str {
        match self {
            WorkerPhase::Starting => "starting",
            WorkerPhase::Calibrating => "calibrating",
            WorkerPhase::Listening => "listening",
            WorkerPhase::Recognizing => "recognizing",
            WorkerPhase::BackingOff => "retrying",
            WorkerPhase::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerPhase::Calibrating,
            2 => WorkerPhase::Listening,
            3 => WorkerPhase::Recognizing,
            4 => WorkerPhase::BackingOff,
            5 => WorkerPhase::Stopped,
            _ => WorkerPhase::Starting,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerPhase::Starting => 0,
            WorkerPhase::Calibrating => 1,
            WorkerPhase::Listening => 2,
            WorkerPhase::Recognizing => 3,
            WorkerPhase::BackingOff => 4,
            WorkerPhase::Stopped => 5,
        }
    }
}

/// Outcome counters written by the worker and read by the UI thread.
#[derive(Debug, Default)]
pub struct VoiceStats {
    heard: AtomicU64,
    timeouts: AtomicU64,
    no_speech: AtomicU64,
    unintelligible: AtomicU64,
    service_errors: AtomicU64,
    device_errors: AtomicU64,
    phase: AtomicU8,
    last_heard: Mutex<Option<String>>,
}

/// Point-in-time copy of [`VoiceStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceStatsSnapshot {
    pub heard: u64,
    pub timeouts: u64,
    pub no_speech: u64,
    pub unintelligible: u64,
    pub service_errors: u64,
    pub device_errors: u64,
    pub phase: WorkerPhase,
    pub last_heard: Option<String>,
}

impl VoiceStats {
    pub fn snapshot(&self) -> VoiceStatsSnapshot {
        VoiceStatsSnapshot {
            heard: self.heard.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            no_speech: self.no_speech.load(Ordering::Relaxed),
            unintelligible: self.unintelligible.load(Ordering::Relaxed),
            service_errors: self.service_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            phase: self.phase(),
            last_heard: lock_or_recover(&self.last_heard, "voice_stats.last_heard").clone(),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_heard(&self, utterance: &str) {
        Self::bump(&self.heard);
        *lock_or_recover(&self.last_heard, "voice_stats.last_heard") = Some(utterance.to_string());
    }
}

/// Handle to the running worker thread.
pub struct VoiceWorker {
    stop: Arc<AtomicBool>,
    stats: Arc<VoiceStats>,
    handle: Option<thread::JoinHandle<()>>,
    meter: Option<LiveMeter>,
}

impl VoiceWorker {
    /// Start the worker. It runs until [`VoiceWorker::request_stop`] or until
    /// the queue's consumer goes away.
    pub fn spawn(
        source: Box<dyn AudioSource + Send>,
        recognizer: Box<dyn Recognizer + Send>,
        producer: CommandProducer<String>,
        settings: VoiceSettings,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(VoiceStats::default());
        let loop_state = WorkerLoop {
            source,
            recognizer,
            producer,
            limits: ListenLimits::new(
                Duration::from_millis(settings.listen_timeout_ms),
                Duration::from_millis(settings.phrase_limit_ms),
            ),
            settings,
            stop: stop.clone(),
            stats: stats.clone(),
        };
        let handle = thread::Builder::new()
            .name("voxsnake-voice".to_string())
            .spawn(move || loop_state.run())
            .context("failed to spawn voice worker thread")?;
        Ok(Self {
            stop,
            stats,
            handle: Some(handle),
            meter: None,
        })
    }

    /// Ask the worker to exit after its current step.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop the worker and wait for it, which also releases the microphone.
    pub fn shutdown(mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("voice worker panicked before shutdown");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stats(&self) -> VoiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// Expose the input level of a source that was built with the same meter.
    pub fn with_meter(mut self, meter: LiveMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn level_db(&self) -> Option<f32> {
        self.meter.as_ref().map(LiveMeter::level_db)
    }
}

impl Drop for VoiceWorker {
    fn drop(&mut self) {
        self.request_stop();
    }
}

enum Step {
    Continue,
    BackOff,
    QueueClosed,
}

struct WorkerLoop {
    source: Box<dyn AudioSource + Send>,
    recognizer: Box<dyn Recognizer + Send>,
    producer: CommandProducer<String>,
    settings: VoiceSettings,
    limits: ListenLimits,
    stop: Arc<AtomicBool>,
    stats: Arc<VoiceStats>,
}

impl WorkerLoop {
    fn run(mut self) {
        log_debug(&format!(
            "voice worker started: source='{}' recognizer={}",
            self.source.name(),
            self.recognizer.name()
        ));
        tracing::info!(
            source = %self.source.name(),
            recognizer = self.recognizer.name(),
            "voice_worker_started"
        );

        while !self.stopping() {
            match self.step() {
                Step::Continue => {}
                Step::BackOff => {
                    self.stats.set_phase(WorkerPhase::BackingOff);
                    self.sleep_unless_stopped(Duration::from_millis(self.settings.error_backoff_ms));
                }
                Step::QueueClosed => {
                    log_debug("voice worker: command queue closed; exiting");
                    break;
                }
            }
        }

        self.stats.set_phase(WorkerPhase::Stopped);
        let snapshot = self.stats.snapshot();
        log_debug(&format!(
            "voice worker stopped: heard={} timeouts={} no_speech={} unintelligible={} service_errors={} device_errors={}",
            snapshot.heard,
            snapshot.timeouts,
            snapshot.no_speech,
            snapshot.unintelligible,
            snapshot.service_errors,
            snapshot.device_errors
        ));
        tracing::info!(heard = snapshot.heard, "voice_worker_stopped");
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// One calibrate, listen, recognize pass.
    fn step(&mut self) -> Step {
        self.stats.set_phase(WorkerPhase::Calibrating);
        let ambient_db = match self
            .source
            .ambient_db(Duration::from_millis(self.settings.ambient_ms))
        {
            Ok(db) => db,
            Err(err) => return self.device_error("calibrate", &err),
        };
        if self.stopping() {
            return Step::Continue;
        }
        let threshold_db = speech_threshold_db(
            ambient_db,
            self.settings.energy_margin_db,
            self.settings.energy_floor_db,
        );

        self.stats.set_phase(WorkerPhase::Listening);
        let audio = match self.source.listen(threshold_db, &self.limits) {
            Ok(ListenOutcome::TimedOut) => {
                VoiceStats::bump(&self.stats.timeouts);
                tracing::debug!(outcome = "timeout", ambient_db, threshold_db);
                return Step::Continue;
            }
            Ok(ListenOutcome::Phrase {
                audio,
                speech_ms,
                stop,
            }) => {
                log_debug(&format!(
                    "voice_metrics|ambient_db={ambient_db:.1}|threshold_db={threshold_db:.1}|speech_ms={speech_ms}|samples={}|stop={}",
                    audio.len(),
                    stop.label()
                ));
                audio
            }
            Err(err) => return self.device_error("listen", &err),
        };
        if self.stopping() {
            return Step::Continue;
        }

        self.stats.set_phase(WorkerPhase::Recognizing);
        let started = Instant::now();
        let result = self.recognizer.recognize(&audio);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(text) => {
                let utterance = sanitize_transcript(&text).to_lowercase();
                if utterance.is_empty() {
                    VoiceStats::bump(&self.stats.unintelligible);
                    tracing::debug!(outcome = "unintelligible", elapsed_ms);
                    return Step::Continue;
                }
                self.deliver(utterance, elapsed_ms)
            }
            Err(RecognizeError::NoSpeech) => {
                VoiceStats::bump(&self.stats.no_speech);
                tracing::debug!(outcome = "no_speech", elapsed_ms);
                Step::Continue
            }
            Err(RecognizeError::Unintelligible) => {
                VoiceStats::bump(&self.stats.unintelligible);
                tracing::debug!(outcome = "unintelligible", elapsed_ms);
                Step::Continue
            }
            Err(RecognizeError::ServiceUnavailable(reason)) => {
                VoiceStats::bump(&self.stats.service_errors);
                log_debug(&format!("recognizer unavailable: {reason}"));
                tracing::warn!(outcome = "service_unavailable", %reason, elapsed_ms);
                Step::Continue
            }
        }
    }

    fn deliver(&mut self, utterance: String, elapsed_ms: u64) -> Step {
        log_debug_content(&format!("voice heard: {utterance}"));
        match self.producer.push(utterance.clone()) {
            PushOutcome::Queued => {}
            PushOutcome::Evicted => {
                log_debug("command queue full; dropped the oldest pending utterance");
            }
            PushOutcome::Disconnected => return Step::QueueClosed,
        }
        self.stats.record_heard(&utterance);
        tracing::info!(outcome = "heard", chars = utterance.len(), elapsed_ms);
        Step::Continue
    }

    fn device_error(&self, stage: &str, err: &anyhow::Error) -> Step {
        VoiceStats::bump(&self.stats.device_errors);
        log_debug(&format!("audio {stage} failed: {err:#}"));
        tracing::warn!(outcome = "device_error", stage, error = %format!("{err:#}"));
        Step::BackOff
    }

    fn sleep_unless_stopped(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopping() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_POLL_SLICE));
        }
    }
}
