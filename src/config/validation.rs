use super::defaults::{ISO_639_1_CODES, MAX_GRID_CELLS, MAX_STT_CMD_BYTES, MIN_GRID_CELLS};
use super::{AppConfig, RecognizerKind, VoiceSettings};
use crate::game::Grid;
use anyhow::{anyhow, bail, Result};
use std::path::Path;
use std::time::Duration;

impl AppConfig {
    /// Check CLI values and normalize paths.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_GRID_CELLS..=MAX_GRID_CELLS).contains(&self.grid_width) {
            bail!(
                "--grid-width must be between {MIN_GRID_CELLS} and {MAX_GRID_CELLS}, got {}",
                self.grid_width
            );
        }
        if !(MIN_GRID_CELLS..=MAX_GRID_CELLS).contains(&self.grid_height) {
            bail!(
                "--grid-height must be between {MIN_GRID_CELLS} and {MAX_GRID_CELLS}, got {}",
                self.grid_height
            );
        }
        if !(1..=60).contains(&self.tick_hz) {
            bail!("--tick-hz must be between 1 and 60, got {}", self.tick_hz);
        }
        if !(1..=120).contains(&self.menu_hz) {
            bail!("--menu-hz must be between 1 and 120, got {}", self.menu_hz);
        }
        if !(100..=5_000).contains(&self.ambient_ms) {
            bail!(
                "--ambient-ms must be between 100 and 5000 ms, got {}",
                self.ambient_ms
            );
        }
        if !(100..=10_000).contains(&self.listen_timeout_ms) {
            bail!(
                "--listen-timeout-ms must be between 100 and 10000 ms, got {}",
                self.listen_timeout_ms
            );
        }
        if !(200..=10_000).contains(&self.phrase_limit_ms) {
            bail!(
                "--phrase-limit-ms must be between 200 and 10000 ms, got {}",
                self.phrase_limit_ms
            );
        }
        if !(0.0..=40.0).contains(&self.energy_margin_db) {
            bail!(
                "--energy-margin-db must be between 0.0 and 40.0 dB, got {}",
                self.energy_margin_db
            );
        }
        if !(-90.0..=0.0).contains(&self.energy_floor_db) {
            bail!(
                "--energy-floor-db must be between -90.0 and 0.0 dB, got {}",
                self.energy_floor_db
            );
        }
        if !(1..=4_096).contains(&self.queue_capacity) {
            bail!(
                "--queue-capacity must be between 1 and 4096, got {}",
                self.queue_capacity
            );
        }
        if self.error_backoff_ms > 10_000 {
            bail!(
                "--error-backoff-ms must be at most 10000 ms, got {}",
                self.error_backoff_ms
            );
        }
        if !(500..=60_000).contains(&self.stt_timeout_ms) {
            bail!(
                "--stt-timeout-ms must be between 500 and 60000 ms, got {}",
                self.stt_timeout_ms
            );
        }

        self.validate_lang()?;

        if self.no_voice {
            return Ok(());
        }

        match self.recognizer {
            RecognizerKind::Command => {
                split_stt_command(&self.stt_cmd)?;
            }
            RecognizerKind::Whisper => {
                #[cfg(not(feature = "whisper"))]
                bail!("--recognizer whisper requires building with the 'whisper' feature");

                #[cfg(feature = "whisper")]
                {
                    let model = self
                        .whisper_model_path
                        .as_ref()
                        .ok_or_else(|| anyhow!("--recognizer whisper needs --whisper-model-path"))?;
                    if !model.exists() {
                        bail!("whisper model path '{}' does not exist", model.display());
                    }
                    let canonical = model.canonicalize().map_err(|err| {
                        anyhow!(
                            "failed to canonicalize whisper model path '{}': {err}",
                            model.display()
                        )
                    })?;
                    self.whisper_model_path = Some(canonical);
                }
            }
        }

        Ok(())
    }

    fn validate_lang(&self) -> Result<()> {
        if self.lang.trim().is_empty() {
            bail!("--lang must not be empty");
        }
        if self.lang.eq_ignore_ascii_case("auto") {
            return Ok(());
        }
        if !self
            .lang
            .chars()
            .all(|ch| ch.is_ascii_alphabetic() || ch == '-' || ch == '_')
        {
            bail!("--lang must contain only alphabetic characters or '-'/'_' separators");
        }
        // Allow locale-style values but only check the leading ISO-639-1 code.
        let lang_primary = self
            .lang
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if !ISO_639_1_CODES.contains(&lang_primary.as_str()) {
            bail!(
                "--lang must start with a valid ISO-639-1 code or be 'auto', got '{}'",
                self.lang
            );
        }
        Ok(())
    }

    /// Snapshot the CLI-controlled capture settings for the voice worker.
    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            ambient_ms: self.ambient_ms,
            listen_timeout_ms: self.listen_timeout_ms,
            phrase_limit_ms: self.phrase_limit_ms,
            energy_margin_db: self.energy_margin_db,
            energy_floor_db: self.energy_floor_db,
            error_backoff_ms: self.error_backoff_ms,
        }
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_width, self.grid_height)
    }

    pub fn tick_interval(&self) -> Duration {
        hz_to_interval(self.tick_hz)
    }

    pub fn menu_interval(&self) -> Duration {
        hz_to_interval(self.menu_hz)
    }

    pub fn stt_timeout(&self) -> Duration {
        Duration::from_millis(self.stt_timeout_ms)
    }
}

fn hz_to_interval(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
}

/// Split `--stt-cmd` into program and arguments, rejecting values we would not
/// want to hand to `Command::new`.
pub fn split_stt_command(raw: &str) -> Result<(String, Vec<String>)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("--stt-cmd cannot be empty");
    }
    if trimmed.len() > MAX_STT_CMD_BYTES {
        bail!("--stt-cmd exceeds {MAX_STT_CMD_BYTES} bytes");
    }
    if trimmed.chars().any(|ch| matches!(ch, '\n' | '\r' | '\0')) {
        bail!("--stt-cmd must not contain control characters");
    }
    let parts = shell_words::split(trimmed)
        .map_err(|err| anyhow!("--stt-cmd could not be parsed: {err}"))?;
    let Some((program, args)) = parts.split_first() else {
        bail!("--stt-cmd cannot be empty");
    };
    let path = Path::new(program);
    if (path.is_absolute() || program.contains(std::path::MAIN_SEPARATOR)) && !path.is_file() {
        bail!("--stt-cmd program '{}' is not a file", path.display());
    }
    Ok((program.clone(), args.to_vec()))
}
