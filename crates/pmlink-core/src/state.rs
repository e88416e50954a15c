// ── Device state machine ──
//
// Tracks what the board firmware has told us about the PMIC link and the
// power inputs. Pure: every handler returns the effects the engine must
// carry out (events to publish, commands to send) instead of doing I/O.

use tracing::{debug, info, warn};

use crate::bus::DeviceEvent;
use crate::model::{ConnectivityState, IrqEvent, LoggingEvent, PowerStatus, UsbPower};
use crate::profile::DeviceProfile;

const MSG_NO_RESPONSE: &str = "No response from PMIC.";
const MSG_AVAILABLE: &str = "PMIC available. Application can be restarted.";

/// Something the engine must do in response to a state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(DeviceEvent),
    /// Send the configured reset command.
    IssueReset,
    /// Fetch the diagnostic error logs.
    RequestErrorLogs,
}

#[derive(Debug, Clone)]
pub struct DeviceStateMachine {
    profile: DeviceProfile,
    auto_reboot: bool,
    connectivity: ConnectivityState,
    power: PowerStatus,
}

impl DeviceStateMachine {
    pub fn new(profile: DeviceProfile, auto_reboot: bool) -> Self {
        Self {
            profile,
            auto_reboot,
            connectivity: ConnectivityState::Connected,
            power: PowerStatus::default(),
        }
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    pub fn power(&self) -> PowerStatus {
        self.power
    }

    /// Handle a log record from the control or USB-C sink module.
    pub fn on_log(&mut self, event: &LoggingEvent) -> Vec<Effect> {
        let modules = &self.profile.modules;
        if event.module == modules.control {
            self.on_control(&event.message)
        } else if event.module == modules.usb_cc && self.profile.usb_cc_detection {
            self.on_usb_cc(&event.message)
        } else {
            Vec::new()
        }
    }

    fn on_control(&mut self, message: &str) -> Vec<Effect> {
        match message {
            MSG_NO_RESPONSE => self.transition(ConnectivityState::Disconnected, false),
            MSG_AVAILABLE if self.auto_reboot => {
                self.transition(ConnectivityState::PendingAutoReboot, true)
            }
            MSG_AVAILABLE => self.transition(ConnectivityState::PendingReboot, false),
            _ => Vec::new(),
        }
    }

    fn transition(&mut self, next: ConnectivityState, reset: bool) -> Vec<Effect> {
        if self.connectivity == next {
            debug!(state = %next, "connectivity unchanged");
            return Vec::new();
        }

        match next {
            ConnectivityState::Disconnected => warn!(from = %self.connectivity, "PMIC stopped responding"),
            _ => info!(from = %self.connectivity, to = %next, "connectivity changed"),
        }
        self.connectivity = next;

        let mut effects = Vec::with_capacity(2);
        if reset {
            effects.push(Effect::IssueReset);
        }
        effects.push(Effect::Emit(DeviceEvent::Connectivity(next)));
        effects
    }

    fn on_usb_cc(&mut self, message: &str) -> Vec<Effect> {
        let status = message.rsplit_once(':').map_or(message, |(_, tail)| tail).trim();
        let Some(usb_power) = UsbPower::from_status(status) else {
            debug!(status, "unrecognised USB-C status");
            return Vec::new();
        };

        self.power.usb_power = Some(usb_power);
        vec![Effect::Emit(DeviceEvent::UsbPower(usb_power))]
    }

    /// Handle an interrupt notification.
    pub fn on_irq(&mut self, irq: &IrqEvent) -> Vec<Effect> {
        let names = &self.profile.irq;

        if irq.register == names.vbus_register {
            let present = if irq.event == names.vbus_detected {
                true
            } else if irq.event == names.vbus_removed {
                false
            } else {
                return Vec::new();
            };
            self.power.vbus_present = Some(present);
            return vec![Effect::Emit(DeviceEvent::UsbPowered(present))];
        }

        if irq.register == names.charger_error_register && self.profile.error_logs {
            info!(bit = %irq.event, "charger error interrupt, fetching error logs");
            return vec![Effect::RequestErrorLogs];
        }

        Vec::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::LogLevel;

    fn control(message: &str) -> LoggingEvent {
        LoggingEvent {
            timestamp: 0,
            level: LogLevel::Info,
            module: "module_pmic".into(),
            message: message.into(),
        }
    }

    fn cc_sink(message: &str) -> LoggingEvent {
        LoggingEvent {
            module: "module_cc_sink".into(),
            ..control(message)
        }
    }

    #[test]
    fn repeated_no_response_emits_once() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), false);

        let first = sm.on_log(&control(MSG_NO_RESPONSE));
        let second = sm.on_log(&control(MSG_NO_RESPONSE));

        assert_eq!(
            first,
            vec![Effect::Emit(DeviceEvent::Connectivity(ConnectivityState::Disconnected))]
        );
        assert!(second.is_empty());
        assert_eq!(sm.connectivity(), ConnectivityState::Disconnected);
    }

    #[test]
    fn available_without_auto_reboot_waits_for_user() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), false);
        sm.on_log(&control(MSG_NO_RESPONSE));

        let effects = sm.on_log(&control(MSG_AVAILABLE));
        assert_eq!(
            effects,
            vec![Effect::Emit(DeviceEvent::Connectivity(ConnectivityState::PendingReboot))]
        );
        assert!(sm.on_log(&control(MSG_AVAILABLE)).is_empty());
    }

    #[test]
    fn available_with_auto_reboot_resets_once() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), true);

        let effects = sm.on_log(&control(MSG_AVAILABLE));
        assert_eq!(
            effects,
            vec![
                Effect::IssueReset,
                Effect::Emit(DeviceEvent::Connectivity(ConnectivityState::PendingAutoReboot)),
            ]
        );
        assert!(sm.on_log(&control(MSG_AVAILABLE)).is_empty());
    }

    #[test]
    fn other_control_messages_are_ignored() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), false);
        assert!(sm.on_log(&control("Charger enabled")).is_empty());
        assert_eq!(sm.connectivity(), ConnectivityState::Connected);
    }

    #[test]
    fn usb_cc_status_after_last_colon() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), false);

        let effects = sm.on_log(&cc_sink("CC1: USB: 1.5A High Power"));
        assert_eq!(effects, vec![Effect::Emit(DeviceEvent::UsbPower(UsbPower::HighPower1A5))]);

        sm.on_log(&cc_sink("Default USB 100/500mA"));
        assert_eq!(sm.power().usb_power, Some(UsbPower::Default100To500mA));

        assert!(sm.on_log(&cc_sink("Something else")).is_empty());
    }

    #[test]
    fn usb_cc_ignored_without_detection() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm2100(), false);
        assert!(sm.on_log(&cc_sink("3A High Power")).is_empty());
        assert_eq!(sm.power().usb_power, None);
    }

    #[test]
    fn vbus_interrupts_track_presence() {
        let mut sm = DeviceStateMachine::new(DeviceProfile::npm1300(), false);

        let effects = sm.on_irq(&IrqEvent::new("EVENTSVBUSIN0SET", "EVENTVBUSDETECTED"));
        assert_eq!(effects, vec![Effect::Emit(DeviceEvent::UsbPowered(true))]);

        sm.on_irq(&IrqEvent::new("EVENTSVBUSIN0SET", "EVENTVBUSREMOVED"));
        assert_eq!(sm.power().vbus_present, Some(false));

        assert!(sm.on_irq(&IrqEvent::new("EVENTSVBUSIN0SET", "EVENTVBUSOVRVOLTDETECTED")).is_empty());
    }

    #[test]
    fn charger_error_requests_logs_when_supported() {
        let irq = IrqEvent::new("EVENTSBCHARGER1SET", "EVENTCHGERROR");

        let mut npm1300 = DeviceStateMachine::new(DeviceProfile::npm1300(), false);
        assert_eq!(npm1300.on_irq(&irq), vec![Effect::RequestErrorLogs]);

        let mut npm2100 = DeviceStateMachine::new(DeviceProfile::npm2100(), false);
        assert!(npm2100.on_irq(&irq).is_empty());
    }
}
