//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pmlink_config::ConfigError;
use pmlink_core::CoreError;

/// Process exit codes.
#[allow(dead_code)]
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to the device shell at {endpoint}")]
    #[diagnostic(
        code(pmlink::connection_failed),
        help(
            "Check that the serial bridge is running and reachable.\n\
             Endpoint: {endpoint}"
        )
    )]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: pmlink_shell::Error,
    },

    #[error("No endpoint configured")]
    #[diagnostic(
        code(pmlink::no_endpoint),
        help(
            "Pass --endpoint tcp://host:port, set PMLINK_ENDPOINT,\n\
             or create a profile with: pmlink config init"
        )
    )]
    NoEndpoint,

    #[error("The engine stopped before the command completed")]
    #[diagnostic(
        code(pmlink::released),
        help("The shell link closed. Check the bridge and the board's power.")
    )]
    Released,

    // ── Device ───────────────────────────────────────────────────────

    #[error("Device rejected '{command}': {message}")]
    #[diagnostic(code(pmlink::device_error))]
    DeviceError { command: String, message: String },

    #[error("'{command}' timed out after {millis}ms")]
    #[diagnostic(
        code(pmlink::timeout),
        help("Increase the timeout with --timeout or check that the shell is responsive.")
    )]
    Timeout { command: String, millis: u128 },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pmlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pmlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pmlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(pmlink::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(pmlink::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(pmlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NoEndpoint | Self::Released => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EngineReleased | CoreError::AlreadyAttached => CliError::Released,
            CoreError::DuplicateCommand { command } => CliError::Validation {
                field: "command".into(),
                reason: format!("'{command}' is already in flight"),
            },
            CoreError::Transport(source) => CliError::ConnectionFailed {
                endpoint: "(link)".into(),
                source,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
