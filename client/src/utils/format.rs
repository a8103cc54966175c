use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::constants::MESSAGE_TIME_FORMAT;

/// Local hour:minute for a message timestamp, e.g. `07:05 PM`.
pub fn format_time(timestamp: DateTime<Utc>, tz: Tz) -> String {
    timestamp.with_timezone(&tz).format(MESSAGE_TIME_FORMAT).to_string()
}

/// "1 connection", "3 connections"
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
