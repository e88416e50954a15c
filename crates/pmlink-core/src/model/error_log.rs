// ── Diagnostic error-log sections ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which diagnostic section a block of error lines came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorLogKind {
    ResetCause,
    ChargerError,
    SensorError,
}

impl ErrorLogKind {
    /// Map a dump header token (without the trailing colon).
    pub fn from_header(token: &str) -> Option<Self> {
        match token {
            "RSTCAUSE" => Some(Self::ResetCause),
            "CHARGER_ERROR" => Some(Self::ChargerError),
            "SENSOR_ERROR" => Some(Self::SensorError),
            _ => None,
        }
    }
}

/// One closed section of a diagnostic dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogSection {
    pub kind: ErrorLogKind,
    pub lines: Vec<String>,
}

impl ErrorLogSection {
    pub fn new(kind: ErrorLogKind) -> Self {
        Self {
            kind,
            lines: Vec::new(),
        }
    }
}
