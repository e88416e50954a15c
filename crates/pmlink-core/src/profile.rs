// ── Device capability descriptors ──
//
// One generic engine serves every supported PMIC. What differs between
// models (peripheral counts, which firmware modules exist, interrupt naming)
// is data carried by a `DeviceProfile`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Default wrap point of the device timestamp counter: 99:59:59.999.
pub const DEFAULT_MAX_TIMESTAMP: u64 = 359_999_999;

/// Supported PMIC models.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceModel {
    Npm1300,
    Npm1304,
    Npm2100,
}

impl DeviceModel {
    pub fn profile(self) -> DeviceProfile {
        match self {
            Self::Npm1300 => DeviceProfile::npm1300(),
            Self::Npm1304 => DeviceProfile::npm1304(),
            Self::Npm2100 => DeviceProfile::npm2100(),
        }
    }
}

/// Firmware log module tags the engine dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTags {
    pub adc: String,
    pub irq: String,
    pub control: String,
    pub usb_cc: String,
}

impl Default for ModuleTags {
    fn default() -> Self {
        Self {
            adc: "module_pmic_adc".into(),
            irq: "module_pmic_irq".into(),
            control: "module_pmic".into(),
            usb_cc: "module_cc_sink".into(),
        }
    }
}

/// Interrupt register and bit names the state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqNames {
    pub vbus_register: String,
    pub vbus_removed: String,
    pub vbus_detected: String,
    pub charger_error_register: String,
}

impl Default for IrqNames {
    fn default() -> Self {
        Self {
            vbus_register: "EVENTSVBUSIN0SET".into(),
            vbus_removed: "EVENTVBUSREMOVED".into(),
            vbus_detected: "EVENTVBUSDETECTED".into(),
            charger_error_register: "EVENTSBCHARGER1SET".into(),
        }
    }
}

/// Capability descriptor for one PMIC model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub model: DeviceModel,
    pub bucks: u8,
    /// LDO / load-switch channels.
    pub ldos: u8,
    pub gpios: u8,
    pub leds: u8,
    pub fuel_gauge: bool,
    pub usb_cc_detection: bool,
    pub error_logs: bool,
    pub modules: ModuleTags,
    pub irq: IrqNames,
    pub max_timestamp: u64,
}

impl DeviceProfile {
    pub fn npm1300() -> Self {
        Self {
            model: DeviceModel::Npm1300,
            bucks: 2,
            ldos: 2,
            gpios: 5,
            leds: 3,
            fuel_gauge: true,
            usb_cc_detection: true,
            error_logs: true,
            modules: ModuleTags::default(),
            irq: IrqNames::default(),
            max_timestamp: DEFAULT_MAX_TIMESTAMP,
        }
    }

    /// Same peripheral set as the nPM1300 with a lower-current charger.
    pub fn npm1304() -> Self {
        Self {
            model: DeviceModel::Npm1304,
            ..Self::npm1300()
        }
    }

    /// Primary-cell PMIC: one boost, no charger, no USB-C sink.
    pub fn npm2100() -> Self {
        Self {
            model: DeviceModel::Npm2100,
            bucks: 1,
            ldos: 1,
            gpios: 2,
            leds: 0,
            fuel_gauge: true,
            usb_cc_detection: false,
            error_logs: false,
            modules: ModuleTags::default(),
            irq: IrqNames::default(),
            max_timestamp: DEFAULT_MAX_TIMESTAMP,
        }
    }

    /// Module tags whose lines become `LoggingEvent`s. Anything else is dropped.
    pub fn known_modules(&self) -> Vec<&str> {
        let mut modules = vec![
            self.modules.control.as_str(),
            self.modules.adc.as_str(),
            self.modules.irq.as_str(),
        ];
        if self.usb_cc_detection {
            modules.push(self.modules.usb_cc.as_str());
        }
        modules
    }

    pub fn is_known_module(&self, module: &str) -> bool {
        module == self.modules.control
            || module == self.modules.adc
            || module == self.modules.irq
            || (self.usb_cc_detection && module == self.modules.usb_cc)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::npm1300()
    }
}
