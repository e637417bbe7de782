//! Game state machine and the file logging it shares with the rest of the crate.

mod logging;
mod state;

pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    logging_requested,
};
pub use state::{App, ExitReason, Flow, InputEvent, RoundResult, Screen};
