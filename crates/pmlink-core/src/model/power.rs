// ── Connectivity and power state ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Link-level view of the PMIC as reported by the board firmware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectivityState {
    #[default]
    Connected,
    Disconnected,
    /// The PMIC came back; the application must be restarted by the user.
    PendingReboot,
    /// The PMIC came back and a reset command has already been issued.
    PendingAutoReboot,
}

/// USB-C sink current advertisement detected by the CC logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UsbPower {
    NoConnection,
    #[strum(serialize = "default-100-500ma")]
    #[serde(rename = "default-100-500ma")]
    Default100To500mA,
    #[strum(serialize = "high-power-1a5")]
    #[serde(rename = "high-power-1a5")]
    HighPower1A5,
    #[strum(serialize = "high-power-3a")]
    #[serde(rename = "high-power-3a")]
    HighPower3A,
}

impl UsbPower {
    /// Match the human-readable status text printed by the CC sink module.
    pub fn from_status(text: &str) -> Option<Self> {
        match text {
            "No USB connection" => Some(Self::NoConnection),
            "Default USB 100/500mA" => Some(Self::Default100To500mA),
            "1.5A High Power" => Some(Self::HighPower1A5),
            "3A High Power" => Some(Self::HighPower3A),
            _ => None,
        }
    }

    /// Maximum current the source advertises, in milliamps.
    pub fn max_current_ma(self) -> Option<u32> {
        match self {
            Self::NoConnection => None,
            Self::Default100To500mA => Some(500),
            Self::HighPower1A5 => Some(1500),
            Self::HighPower3A => Some(3000),
        }
    }
}

/// Latest known power inputs. `None` until the device has reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStatus {
    pub usb_power: Option<UsbPower>,
    pub vbus_present: Option<bool>,
}
