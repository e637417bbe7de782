//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_AMBIENT_MS, DEFAULT_ENERGY_FLOOR_DB, DEFAULT_ENERGY_MARGIN_DB,
    DEFAULT_ERROR_BACKOFF_MS, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH, DEFAULT_LISTEN_TIMEOUT_MS,
    DEFAULT_MENU_HZ, DEFAULT_PHRASE_LIMIT_MS, DEFAULT_QUEUE_CAPACITY, DEFAULT_STT_CMD,
    DEFAULT_STT_TIMEOUT_MS, DEFAULT_TICK_HZ, LISTEN_FRAME_MS, PHRASE_PREROLL_MS,
    PHRASE_SILENCE_TAIL_MS,
};
pub use validation::split_stt_command;

/// CLI options for VoxSnake. With no flags the game opens straight into the menu.
#[derive(Debug, Parser, Clone)]
#[command(about = "VoxSnake: a snake game you can steer with your voice", author, version)]
pub struct AppConfig {
    /// Board width in cells
    #[arg(long = "grid-width", default_value_t = DEFAULT_GRID_WIDTH)]
    pub grid_width: u16,

    /// Board height in cells
    #[arg(long = "grid-height", default_value_t = DEFAULT_GRID_HEIGHT)]
    pub grid_height: u16,

    /// Simulation ticks per second while playing
    #[arg(long = "tick-hz", default_value_t = DEFAULT_TICK_HZ)]
    pub tick_hz: u32,

    /// Menu refresh rate (ticks per second)
    #[arg(long = "menu-hz", default_value_t = DEFAULT_MENU_HZ)]
    pub menu_hz: u32,

    /// Seed for food placement (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Go back to the menu after a crash instead of exiting
    #[arg(long = "return-to-menu", default_value_t = false)]
    pub return_to_menu: bool,

    /// Disable the microphone and play with the keyboard only
    #[arg(long = "no-voice", default_value_t = false)]
    pub no_voice: bool,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Sample ambient noise, print the level and the resulting threshold, then exit
    #[arg(long = "mic-meter", default_value_t = false)]
    pub mic_meter: bool,

    /// Ambient noise calibration window before every listen (milliseconds)
    #[arg(long = "ambient-ms", default_value_t = DEFAULT_AMBIENT_MS)]
    pub ambient_ms: u64,

    /// How long to wait for speech to begin (milliseconds)
    #[arg(long = "listen-timeout-ms", default_value_t = DEFAULT_LISTEN_TIMEOUT_MS)]
    pub listen_timeout_ms: u64,

    /// Longest phrase captured once speech begins (milliseconds)
    #[arg(long = "phrase-limit-ms", default_value_t = DEFAULT_PHRASE_LIMIT_MS)]
    pub phrase_limit_ms: u64,

    /// Decibels above the ambient level that count as speech
    #[arg(long = "energy-margin-db", default_value_t = DEFAULT_ENERGY_MARGIN_DB)]
    pub energy_margin_db: f32,

    /// Lowest speech threshold allowed after calibration (dBFS)
    #[arg(
        long = "energy-floor-db",
        default_value_t = DEFAULT_ENERGY_FLOOR_DB,
        allow_hyphen_values = true
    )]
    pub energy_floor_db: f32,

    /// Pending voice commands kept before the oldest is dropped
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Pause after an audio device error before listening again (milliseconds)
    #[arg(long = "error-backoff-ms", default_value_t = DEFAULT_ERROR_BACKOFF_MS)]
    pub error_backoff_ms: u64,

    /// Speech recognizer backend
    #[arg(long, value_enum, default_value_t = RecognizerKind::Command)]
    pub recognizer: RecognizerKind,

    /// Speech-to-text command line; the WAV path is appended as the last argument
    #[arg(long = "stt-cmd", env = "VOXSNAKE_STT_CMD", default_value = DEFAULT_STT_CMD)]
    pub stt_cmd: String,

    /// Kill the speech-to-text command after this long (milliseconds)
    #[arg(long = "stt-timeout-ms", default_value_t = DEFAULT_STT_TIMEOUT_MS)]
    pub stt_timeout_ms: u64,

    /// Whisper model path (required for --recognizer whisper)
    #[arg(long)]
    pub whisper_model_path: Option<PathBuf>,

    /// Language passed to the recognizer
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOXSNAKE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOXSNAKE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging recognized transcripts (debug log only)
    #[arg(
        long = "log-content",
        env = "VOXSNAKE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

/// Runtime-selectable speech recognizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecognizerKind {
    /// External speech-to-text program fed a WAV file
    Command,
    /// In-process whisper.cpp model (needs the `whisper` feature)
    Whisper,
}

impl RecognizerKind {
    pub fn label(self) -> &'static str {
        match self {
            RecognizerKind::Command => "command",
            RecognizerKind::Whisper => "whisper",
        }
    }
}

/// Timing and threshold knobs for the background voice worker.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub ambient_ms: u64,
    pub listen_timeout_ms: u64,
    pub phrase_limit_ms: u64,
    pub energy_margin_db: f32,
    pub energy_floor_db: f32,
    pub error_backoff_ms: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            ambient_ms: DEFAULT_AMBIENT_MS,
            listen_timeout_ms: DEFAULT_LISTEN_TIMEOUT_MS,
            phrase_limit_ms: DEFAULT_PHRASE_LIMIT_MS,
            energy_margin_db: DEFAULT_ENERGY_MARGIN_DB,
            energy_floor_db: DEFAULT_ENERGY_FLOOR_DB,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
        }
    }
}
