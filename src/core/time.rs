//! Shared timestamp and identifier helpers.

use std::time::Duration;
use ulid::Ulid;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// New lowercase record/collection id.
pub fn new_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Human-readable elapsed-time string for API responses (e.g. `1.02s`,
/// `340.1ms`).
pub fn format_duration(d: Duration) -> String {
    format!("{:?}", d)
}
