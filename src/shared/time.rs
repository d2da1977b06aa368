use chrono::{DateTime, Utc};

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

pub fn now_utc() -> DateTime<Utc> {
    // Millisecond precision so timestamps survive a round trip through storage.
    let millis = Utc::now().timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}
