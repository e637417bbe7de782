//! `--mic-meter`: measure the room and a spoken word, then show the speech
//! threshold the voice worker would use and a margin that fits this mic.

use crate::audio::{peak_db, rms_db, speech_threshold_db, Recorder, METER_FLOOR_DB};
use crate::config::AppConfig;
use anyhow::Result;
use std::io::{self, Write};
use std::time::Duration;

const SPEECH_SAMPLE_MS: u64 = 2_000;
const BAR_WIDTH: usize = 30;
const MAX_SUGGESTED_MARGIN_DB: f32 = 40.0;

/// Levels of one recording, in dBFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLevel {
    pub rms_db: f32,
    pub peak_db: f32,
}

impl AudioLevel {
    fn of(samples: &[f32]) -> Self {
        Self {
            rms_db: rms_db(samples),
            peak_db: peak_db(samples),
        }
    }
}

pub fn run_mic_meter(config: &AppConfig) -> Result<()> {
    let recorder = Recorder::new(config.input_device.as_deref())?;
    println!("Mic meter using input device: {}", recorder.device_name());

    println!(
        "Sampling ambient noise for {:.1}s... stay quiet.",
        config.ambient_ms as f32 / 1000.0
    );
    io::stdout().flush().ok();
    let ambient = AudioLevel::of(&recorder.record_for(Duration::from_millis(config.ambient_ms))?);

    println!(
        "Sampling speech for {:.1}s... say \"left\" or \"start\".",
        SPEECH_SAMPLE_MS as f32 / 1000.0
    );
    io::stdout().flush().ok();
    let speech = AudioLevel::of(&recorder.record_for(Duration::from_millis(SPEECH_SAMPLE_MS))?);

    let threshold = speech_threshold_db(
        ambient.rms_db,
        config.energy_margin_db,
        config.energy_floor_db,
    );
    println!();
    println!("ambient  {}", format_level(ambient));
    println!("speech   {}", format_level(speech));
    println!(
        "threshold {threshold:.1} dBFS (margin {:.1} dB, floor {:.1} dBFS)",
        config.energy_margin_db, config.energy_floor_db
    );

    let (margin, warning) = suggest_margin(ambient.rms_db, speech.peak_db);
    println!("\nSuggested --energy-margin-db: {margin:.1}");
    if let Some(message) = warning {
        println!("Note: {message}");
    }
    Ok(())
}

fn format_level(level: AudioLevel) -> String {
    format!(
        "[{}] rms {:.1} dBFS, peak {:.1} dBFS",
        level_bar(level.rms_db, BAR_WIDTH),
        level.rms_db,
        level.peak_db
    )
}

/// Horizontal bar from the meter floor (empty) to 0 dBFS (full).
pub fn level_bar(db: f32, width: usize) -> String {
    let fraction = ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0);
    let filled = (fraction * width as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

/// Pick a margin that sits between the room level and the loudest speech.
pub fn suggest_margin(ambient_db: f32, speech_peak_db: f32) -> (f32, Option<&'static str>) {
    let headroom = speech_peak_db - ambient_db;
    if headroom <= 0.0 {
        return (
            1.0,
            Some("Speech was not louder than the room; voice control will be unreliable."),
        );
    }
    let margin = (headroom / 2.0).clamp(1.0, MAX_SUGGESTED_MARGIN_DB);
    let warning = (headroom < 12.0)
        .then_some("Speech is close to the room level; try a quieter room or a closer mic.");
    (margin, warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bar_spans_floor_to_full_scale() {
        assert_eq!(level_bar(METER_FLOOR_DB, 4), "----");
        assert_eq!(level_bar(-100.0, 4), "----");
        assert_eq!(level_bar(0.0, 4), "####");
        assert_eq!(level_bar(-30.0, 4), "##--");
    }

    #[test]
    fn margin_is_half_the_headroom() {
        let (margin, warning) = suggest_margin(-50.0, -20.0);
        assert_eq!(margin, 15.0);
        assert!(warning.is_none());
    }

    #[test]
    fn quiet_speech_gets_a_warning() {
        let (margin, warning) = suggest_margin(-40.0, -32.0);
        assert_eq!(margin, 4.0);
        assert!(warning.is_some());
        let (margin, warning) = suggest_margin(-40.0, -45.0);
        assert_eq!(margin, 1.0);
        assert!(warning.is_some());
    }

    #[test]
    fn audio_level_of_silence_is_the_floor() {
        let level = AudioLevel::of(&[]);
        assert_eq!(level.rms_db, METER_FLOOR_DB);
        assert_eq!(level.peak_db, METER_FLOOR_DB);
    }
}
