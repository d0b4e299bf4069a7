//! ID and timestamp generation.
//!
//! Both are treated as opaque utilities by the rest of the crate: IDs only
//! need to be unique within a type, timestamps only need to compare
//! lexicographically in creation order (RFC 3339 UTC does).

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Generate a unique object ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp as an RFC 3339 string.
pub fn date_time_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
