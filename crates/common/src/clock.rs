//! Wall-clock helper

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as a unix timestamp in milliseconds.
///
/// Every expiry in the workspace (identity sessions, launcher sessions,
/// product key creation) is stored in this representation.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
