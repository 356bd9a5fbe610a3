//! Alert payload and file-line formatting.

use chrono::NaiveDateTime;

use crate::monitor::threshold::Minimum;
use crate::monitor::types::AlertMessage;

pub const ALERT_DESCRIPTION: &str = "WARNING: Balance Below minimum.";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render a local wall-clock time as `yyyy-MM-dd HH:mm`.
pub fn format_time(now: &NaiveDateTime) -> String {
    now.format(TIME_FORMAT).to_string()
}

/// Build the structured alert for a single breach.
pub fn format_alert(minimum: Minimum, amount: i64, now: &NaiveDateTime) -> AlertMessage {
    AlertMessage {
        description: ALERT_DESCRIPTION.to_string(),
        minimum: minimum.to_string(),
        balance: amount.to_string(),
        time: format_time(now),
    }
}

/// Line appended to the file sink, without the trailing newline.
pub fn format_line(message: &AlertMessage) -> String {
    format!(
        "{} MIN: {} BALANCE: {} at TIME {}",
        message.description, message.minimum, message.balance, message.time
    )
}
