//! Microphone capture for the voice worker.
//!
//! Every listen is energy gated: sample the room to pick a threshold, wait a
//! bounded time for speech to cross it, then record a bounded phrase. Audio is
//! downmixed to mono and resampled to 16 kHz before it reaches a recognizer.

/// Sample rate every recognizer receives.
pub const TARGET_RATE: u32 = 16_000;

mod dispatch;
mod listen;
mod meter;
mod recorder;
mod resample;

pub use listen::{listen_frames, FrameEvent, ListenLimits, ListenOutcome, ListenStop};
pub use meter::{peak_db, rms_db, LiveMeter, METER_FLOOR_DB};
pub use recorder::Recorder;
pub use resample::resample_to_target_rate;

use anyhow::Result;
use std::time::Duration;

/// A microphone as the voice worker sees it. Both calls block, but never for
/// longer than the durations they are given (plus device start-up).
pub trait AudioSource {
    /// Record `window` of room noise and return its RMS level in dBFS.
    fn ambient_db(&mut self, window: Duration) -> Result<f32>;

    /// Wait up to `limits.timeout` for speech louder than `threshold_db`, then
    /// capture at most `limits.phrase_limit` of it.
    fn listen(&mut self, threshold_db: f32, limits: &ListenLimits) -> Result<ListenOutcome>;

    fn name(&self) -> String {
        "audio source".to_string()
    }
}

/// Speech threshold after ambient calibration: a margin above the room level,
/// never below the configured floor.
pub fn speech_threshold_db(ambient_db: f32, margin_db: f32, floor_db: f32) -> f32 {
    (ambient_db + margin_db).max(floor_db)
}
