// ── Device log records ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity tag of a device log line (`<err>`, `<wrn>`, `<inf>`, `<dbg>`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Unknown,
}

impl LogLevel {
    /// Map the three-letter Zephyr tag. Unrecognised tags become `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "err" => Self::Error,
            "wrn" => Self::Warning,
            "inf" => Self::Info,
            "dbg" => Self::Debug,
            _ => Self::Unknown,
        }
    }
}

/// One parsed device log line.
///
/// `timestamp` is the raw device counter in milliseconds since boot. It
/// wraps; only ADC samples carry the overflow-corrected logical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingEvent {
    pub timestamp: u64,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
}
