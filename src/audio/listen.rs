//! Energy-gated phrase capture.
//!
//! Frames are labelled speech or quiet by comparing their RMS level with the
//! calibrated threshold. Listening waits for the first speech frame (bounded by
//! the listen timeout) and then records until the phrase limit or a quiet tail.

use super::meter::{rms_db, LiveMeter};
use crate::config::{LISTEN_FRAME_MS, PHRASE_PREROLL_MS, PHRASE_SILENCE_TAIL_MS};
use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::time::Duration;

/// Bounds for one listen.
#[derive(Debug, Clone)]
pub struct ListenLimits {
    /// How long to wait for speech to start.
    pub timeout: Duration,
    /// Longest phrase kept once speech started.
    pub phrase_limit: Duration,
    pub frame_ms: u64,
    pub silence_tail_ms: u64,
    pub preroll_ms: u64,
}

impl ListenLimits {
    pub fn new(timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            timeout,
            phrase_limit,
            frame_ms: LISTEN_FRAME_MS,
            silence_tail_ms: PHRASE_SILENCE_TAIL_MS,
            preroll_ms: PHRASE_PREROLL_MS,
        }
    }
}

/// Why a listen ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenStop {
    WaitTimeout,
    PhraseLimit,
    Silence { tail_ms: u64 },
}

impl ListenStop {
    pub fn label(&self) -> &'static str {
        match self {
            ListenStop::WaitTimeout => "wait_timeout",
            ListenStop::PhraseLimit => "phrase_limit",
            ListenStop::Silence { .. } => "silence",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListenOutcome {
    /// Speech was heard; `audio` is mono at the capture rate.
    Phrase {
        audio: Vec<f32>,
        speech_ms: u64,
        stop: ListenStop,
    },
    /// Nobody spoke before the listen timeout.
    TimedOut,
}

/// One pull from the frame source.
#[derive(Debug)]
pub enum FrameEvent {
    Frame(Vec<f32>),
    /// No frame arrived within one frame period.
    Gap,
    Closed,
}

/// Tracks wait and phrase durations and decides when listening stops.
pub(super) struct ListenState {
    frame_ms: u64,
    timeout_ms: u64,
    phrase_limit_ms: u64,
    silence_tail_ms: u64,
    waited_ms: u64,
    phrase_ms: u64,
    speech_ms: u64,
    silence_streak_ms: u64,
    speaking: bool,
}

impl ListenState {
    pub(super) fn new(limits: &ListenLimits) -> Self {
        Self {
            frame_ms: limits.frame_ms.max(1),
            timeout_ms: limits.timeout.as_millis() as u64,
            phrase_limit_ms: limits.phrase_limit.as_millis() as u64,
            silence_tail_ms: limits.silence_tail_ms,
            waited_ms: 0,
            phrase_ms: 0,
            speech_ms: 0,
            silence_streak_ms: 0,
            speaking: false,
        }
    }

    pub(super) fn on_frame(&mut self, is_speech: bool) -> Option<ListenStop> {
        if !self.speaking {
            if !is_speech {
                self.waited_ms = self.waited_ms.saturating_add(self.frame_ms);
                return (self.waited_ms >= self.timeout_ms).then_some(ListenStop::WaitTimeout);
            }
            self.speaking = true;
        }

        self.phrase_ms = self.phrase_ms.saturating_add(self.frame_ms);
        if is_speech {
            self.speech_ms = self.speech_ms.saturating_add(self.frame_ms);
            self.silence_streak_ms = 0;
        } else {
            self.silence_streak_ms = self.silence_streak_ms.saturating_add(self.frame_ms);
        }

        if self.phrase_ms >= self.phrase_limit_ms {
            return Some(ListenStop::PhraseLimit);
        }
        if self.silence_streak_ms >= self.silence_tail_ms {
            return Some(ListenStop::Silence {
                tail_ms: self.silence_streak_ms,
            });
        }
        None
    }

    pub(super) fn speaking(&self) -> bool {
        self.speaking
    }

    pub(super) fn speech_ms(&self) -> u64 {
        self.speech_ms
    }
}

/// Drive one listen from a frame source. `next_frame` is expected to wait
/// roughly one frame period before reporting a [`FrameEvent::Gap`].
pub fn listen_frames<F>(
    mut next_frame: F,
    threshold_db: f32,
    sample_rate: u32,
    limits: &ListenLimits,
    meter: Option<&LiveMeter>,
) -> Result<ListenOutcome>
where
    F: FnMut() -> FrameEvent,
{
    let preroll_samples = ((limits.preroll_ms * u64::from(sample_rate)) / 1000) as usize;
    let mut state = ListenState::new(limits);
    let mut preroll: VecDeque<Vec<f32>> = VecDeque::new();
    let mut preroll_len = 0usize;
    let mut phrase = Vec::new();

    loop {
        let (frame, is_speech) = match next_frame() {
            FrameEvent::Frame(frame) => {
                let level = rms_db(&frame);
                if let Some(meter) = meter {
                    meter.set_db(level);
                }
                (Some(frame), level >= threshold_db)
            }
            FrameEvent::Gap => (None, false),
            FrameEvent::Closed => bail!("audio stream closed while listening"),
        };

        let was_speaking = state.speaking();
        let stop = state.on_frame(is_speech);

        if let Some(frame) = frame {
            if state.speaking() {
                if !was_speaking {
                    for earlier in preroll.drain(..) {
                        phrase.extend(earlier);
                    }
                }
                phrase.extend(frame);
            } else {
                preroll_len += frame.len();
                preroll.push_back(frame);
                while preroll_len > preroll_samples {
                    match preroll.pop_front() {
                        Some(old) => preroll_len -= old.len(),
                        None => break,
                    }
                }
            }
        }

        match stop {
            Some(ListenStop::WaitTimeout) => return Ok(ListenOutcome::TimedOut),
            Some(stop) => {
                return Ok(ListenOutcome::Phrase {
                    audio: phrase,
                    speech_ms: state.speech_ms(),
                    stop,
                })
            }
            None => {}
        }
    }
}
