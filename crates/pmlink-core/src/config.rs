// ── Engine configuration ──
//
// Describes how one engine instance behaves. Built by the caller (CLI or
// `pmlink-config`) and handed in; core never reads config files.

use std::time::Duration;

use crate::error::CoreError;
use crate::profile::DeviceProfile;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DUMP_SETTLE: Duration = Duration::from_millis(250);
pub const DEFAULT_PROMPT: &str = "uart:~$";
pub const DEFAULT_RESET_COMMAND: &str = "kernel reboot cold";
pub const DEFAULT_ERROR_LOG_COMMAND: &str = "npmx errlog get";

/// Configuration for one engine attachment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capabilities of the attached device.
    pub profile: DeviceProfile,
    /// Bound on waiting for any single command's response.
    pub command_timeout: Duration,
    /// Quiet interval after which a buffered dump is considered complete.
    pub dump_settle: Duration,
    /// Reset the device as soon as the PMIC reports it is available again.
    pub auto_reboot: bool,
    /// Shell prompt the device echoes commands behind.
    pub prompt: String,
    pub reset_command: String,
    pub error_log_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: DeviceProfile::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            dump_settle: DEFAULT_DUMP_SETTLE,
            auto_reboot: false,
            prompt: DEFAULT_PROMPT.into(),
            reset_command: DEFAULT_RESET_COMMAND.into(),
            error_log_command: DEFAULT_ERROR_LOG_COMMAND.into(),
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot run with.
    ///
    /// An empty prompt would classify every line as a prompt.
    pub fn validate(&self) -> Result<(), CoreError> {
        let problem = if self.prompt.trim().is_empty() {
            "prompt must not be empty"
        } else if self.command_timeout.is_zero() {
            "command timeout must be greater than zero"
        } else if self.reset_command.trim().is_empty() {
            "reset command must not be empty"
        } else if self.error_log_command.trim().is_empty() {
            "error log command must not be empty"
        } else {
            return Ok(());
        };
        Err(CoreError::Config {
            message: problem.into(),
        })
    }
}
