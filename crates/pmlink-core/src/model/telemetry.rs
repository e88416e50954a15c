// ── Telemetry and interrupt records ──

use serde::{Deserialize, Serialize};

/// One fuel-gauge / ADC reading.
///
/// Every measurement is independently optional: a key the device did not
/// send, or sent with an unparseable value, is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdcSample {
    /// Logical milliseconds, corrected for counter wraps.
    pub timestamp: u64,
    /// Battery voltage (V), two decimals.
    pub vbat: Option<f64>,
    /// Battery current (mA), two decimals.
    pub ibat: Option<f64>,
    /// Battery temperature (°C), one decimal.
    pub tbat: Option<f64>,
    /// State of charge (%), one decimal, within `0..=100`.
    pub soc: Option<f64>,
    /// Time to empty (s).
    pub tte: Option<f64>,
    /// Time to full (s).
    pub ttf: Option<f64>,
}

/// A single interrupt notification: which register fired, and which bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrqEvent {
    #[serde(rename = "type")]
    pub register: String,
    pub event: String,
}

impl IrqEvent {
    pub fn new(register: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            register: register.into(),
            event: event.into(),
        }
    }

    pub fn is(&self, register: &str, event: &str) -> bool {
        self.register == register && self.event == event
    }
}
