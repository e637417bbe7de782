pub const DEFAULT_GRID_WIDTH: u16 = 40;
pub const DEFAULT_GRID_HEIGHT: u16 = 30;
pub const MIN_GRID_CELLS: u16 = 5;
pub const MAX_GRID_CELLS: u16 = 200;

pub const DEFAULT_TICK_HZ: u32 = 15;
pub const DEFAULT_MENU_HZ: u32 = 30;

pub const DEFAULT_AMBIENT_MS: u64 = 500;
pub const DEFAULT_LISTEN_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_PHRASE_LIMIT_MS: u64 = 1_000;
pub const DEFAULT_ENERGY_MARGIN_DB: f32 = 6.0;
pub const DEFAULT_ENERGY_FLOOR_DB: f32 = -50.0;
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 500;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub const DEFAULT_STT_CMD: &str = "voxsnake-stt";
pub const DEFAULT_STT_TIMEOUT_MS: u64 = 5_000;

/// Frame size used for energy gating while listening.
pub const LISTEN_FRAME_MS: u64 = 20;
/// Trailing quiet that closes a phrase before the phrase limit.
pub const PHRASE_SILENCE_TAIL_MS: u64 = 400;
/// Audio kept from just before speech crossed the threshold.
pub const PHRASE_PREROLL_MS: u64 = 200;

pub(super) const MAX_STT_CMD_BYTES: usize = 1024;

pub(super) const ISO_639_1_CODES: &[&str] = &[
    "aa", "ab", "af", "am", "ar", "as", "az", "ba", "be", "bg", "bn", "bo", "br", "bs", "ca", "cs",
    "cy", "da", "de", "el", "en", "es", "et", "eu", "fa", "fi", "fo", "fr", "ga", "gl", "gu", "ha",
    "he", "hi", "hr", "ht", "hu", "hy", "id", "is", "it", "ja", "jw", "ka", "kk", "km", "kn", "ko",
    "la", "lb", "ln", "lo", "lt", "lv", "mg", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "ne",
    "nl", "nn", "no", "oc", "pa", "pl", "ps", "pt", "ro", "ru", "sa", "sd", "si", "sk", "sl", "sn",
    "so", "sq", "sr", "su", "sv", "sw", "ta", "te", "tg", "th", "tk", "tl", "tr", "tt", "uk", "ur",
    "uz", "vi", "yi", "yo", "zh",
];
