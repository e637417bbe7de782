pub mod app;
pub mod audio;
pub mod command;
pub mod config;
pub mod game;
mod lock;
pub mod mic_meter;
pub mod queue;
pub mod stt;
pub mod telemetry;
pub mod terminal_restore;
pub mod ui;
pub mod voice;

pub(crate) use lock::lock_or_recover;
pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic, App,
    ExitReason,
};
pub use voice::{VoiceStatsSnapshot, VoiceWorker, WorkerPhase};
