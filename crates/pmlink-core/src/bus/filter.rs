// ── Filter predicates for event subscriptions ──

use std::collections::HashSet;

use super::{DeviceEvent, EventKind};

/// Which events a subscription receives.
pub enum EventFilter {
    All,
    Kinds(HashSet<EventKind>),
    /// Log records from one firmware module only.
    Module(String),
    Custom(Box<dyn Fn(&DeviceEvent) -> bool + Send + Sync>),
}

impl EventFilter {
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self::Kinds(kinds.into_iter().collect())
    }

    pub fn matches(&self, event: &DeviceEvent) -> bool {
        match self {
            Self::All => true,
            Self::Kinds(kinds) => kinds.contains(&event.kind()),
            Self::Module(module) => {
                matches!(event, DeviceEvent::Log { event, .. } if event.module == *module)
            }
            Self::Custom(f) => f(event),
        }
    }
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            Self::Module(module) => f.debug_tuple("Module").field(module).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLevel, LoggingEvent};

    fn log(module: &str) -> DeviceEvent {
        DeviceEvent::Log {
            event: LoggingEvent {
                timestamp: 0,
                level: LogLevel::Info,
                module: module.into(),
                message: String::new(),
            },
            grouped: false,
        }
    }

    #[test]
    fn module_filter_matches_log_records_only() {
        let filter = EventFilter::Module("module_pmic".into());
        assert!(filter.matches(&log("module_pmic")));
        assert!(!filter.matches(&log("module_pmic_adc")));
        assert!(!filter.matches(&DeviceEvent::UsbPowered(true)));
    }

    #[test]
    fn custom_filter() {
        let filter = EventFilter::Custom(Box::new(|e| matches!(e, DeviceEvent::UsbPowered(true))));
        assert!(filter.matches(&DeviceEvent::UsbPowered(true)));
        assert!(!filter.matches(&DeviceEvent::UsbPowered(false)));
        assert!(EventFilter::All.matches(&log("x")));
    }
}
