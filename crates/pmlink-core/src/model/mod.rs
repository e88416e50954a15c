// ── Device domain model ──
//
// Every value the engine publishes. Types here are plain data: parsing
// lives in `crate::parser`, state transitions in `crate::state`.

pub mod error_log;
pub mod log;
pub mod power;
pub mod telemetry;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use pmlink_core::model::*` gives you everything.

pub use error_log::{ErrorLogKind, ErrorLogSection};
pub use log::{LogLevel, LoggingEvent};
pub use power::{ConnectivityState, PowerStatus, UsbPower};
pub use telemetry::{AdcSample, IrqEvent};
