//! Protocol engine for PMIC evaluation boards.
//!
//! The board firmware speaks a line-oriented shell: unsolicited log lines
//! (telemetry, interrupts, state changes) interleaved with replies to
//! commands the host sends. [`Engine`] turns that stream into typed
//! [`DeviceEvent`]s and pairs each [`CommandRequest`] with its reply.
//!
//! ```rust,ignore
//! use pmlink_core::{CommandRequest, Engine, EngineConfig};
//!
//! let (link, _device) = pmlink_shell::loopback();
//! let engine = Engine::new(EngineConfig::default());
//! let mut events = engine.subscribe();
//! engine.connect(link).await?;
//!
//! let result = engine.execute(CommandRequest::new("npmx charger status get")).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod bus;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod profile;
pub mod segmenter;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{DeviceEvent, EventBus, EventFilter, EventKind, EventStream, Subscription};
pub use command::{CommandRequest, CommandResult, PendingCommand, ResponseShape, Uniqueness};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::CoreError;
pub use profile::{DeviceModel, DeviceProfile};
pub use segmenter::ErrorLogSegmenter;
pub use state::{DeviceStateMachine, Effect};

pub use model::{
    AdcSample, ConnectivityState, ErrorLogKind, ErrorLogSection, IrqEvent, LogLevel, LoggingEvent,
    PowerStatus, UsbPower,
};
