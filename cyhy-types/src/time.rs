use chrono::{DateTime, Utc};

/// Current time as a timezone-aware UTC timestamp.
pub fn utcnow() -> DateTime<Utc> {
    Utc::now()
}
