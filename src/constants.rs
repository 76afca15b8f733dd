use once_cell::sync::Lazy;

pub const AUTH_BASE_URL: &str = "https://id.drafthud.io";
pub const AUTH_REALM: &str = "drafthud";
pub const AUTH_CLIENT_ID: &str = "default-client";
pub const API_BASE_URL: &str = "https://api.drafthud.io";

/// Window title substring the overlay attaches to.
pub const TARGET_WINDOW_TITLE: &str = "Overwatch";

pub const TOKEN_FILE: &str = "drafthud_oauth_token.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// A token within this many seconds of expiry is treated as expired for new requests.
pub const EXPIRY_MARGIN_SECS: i64 = 30;
/// The background renewal task refreshes tokens expiring within this window.
pub const RENEWAL_MARGIN_SECS: i64 = 60;
/// Interval of the background renewal task.
pub const RENEWAL_INTERVAL_SECS: u64 = 300;

/// Delay after a new screenshot file appears before reading it.
pub const SETTLE_DELAY_MS: u64 = 200;
/// One UI frame worth of delay so a hide can render before capture.
pub const FRAME_DELAY_MS: u64 = 50;
/// Interval of the overlay position poll.
pub const POSITION_POLL_SECS: u64 = 1;

/// Total submit attempts for transient failures (network, 5xx, malformed body).
pub const SUBMIT_ATTEMPTS: u32 = 3;
pub const SUBMIT_BACKOFF_BASE_MS: u64 = 500;

/// Log files older than this are removed at startup.
pub const LOG_RETENTION_DAYS: u64 = 7;

pub static USER_AGENT: Lazy<String> =
    Lazy::new(|| format!("drafthud/{}", env!("CARGO_PKG_VERSION")));
