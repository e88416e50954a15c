// ── Command API ──
//
// Every command sent to the device shell is a `CommandRequest`. The engine
// queues it, the correlator pairs it with the device's reply, and the caller
// gets exactly one `CommandResult` back through a `PendingCommand`.

pub(crate) mod correlator;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::CoreError;

/// What to do when a command with the same text is already outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Uniqueness {
    /// Always transmit.
    #[default]
    NotUnique,
    /// Do not transmit; observe the outstanding request's result.
    JoinInFlight,
    /// Do not transmit; fail with [`CoreError::DuplicateCommand`].
    RejectDuplicate,
}

/// How the device's reply to a command is framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// The first response line resolves the request. With a prefix set,
    /// lines that do not start with it are skipped as unrelated chatter.
    Line { expect_prefix: Option<String> },
    /// Lines accumulate until a prompt, a quiet interval, or the deadline.
    Dump,
}

impl Default for ResponseShape {
    fn default() -> Self {
        Self::Line {
            expect_prefix: None,
        }
    }
}

/// A command to send to the device shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub uniqueness: Uniqueness,
    pub shape: ResponseShape,
    /// Overrides the engine's default command timeout.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into().trim().to_owned(),
            uniqueness: Uniqueness::default(),
            shape: ResponseShape::default(),
            timeout: None,
        }
    }

    pub fn unique(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn dump(mut self) -> Self {
        self.shape = ResponseShape::Dump;
        self
    }

    pub fn expect_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shape = ResponseShape::Line {
            expect_prefix: Some(prefix.into()),
        };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Terminal outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum CommandResult {
    /// The response line, or the dump lines joined by `\n`.
    Success(String),
    /// Text after the device's `error:` prefix.
    Error(String),
    Timeout,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload of a successful result.
    pub fn success(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            _ => None,
        }
    }
}

pub(crate) type ResponseSender = oneshot::Sender<Result<CommandResult, CoreError>>;

/// A command envelope sent through the engine's inbound channel.
pub(crate) struct CommandEnvelope {
    pub request: CommandRequest,
    pub response_tx: Option<ResponseSender>,
    /// Segment the result and publish error-log sections.
    pub error_logs: bool,
}

/// Future resolving to the result of an issued command.
///
/// Resolves to `Err(CoreError::EngineReleased)` if the engine is torn down
/// first, and `Err(CoreError::DuplicateCommand)` for a rejected duplicate.
#[derive(Debug)]
#[must_use = "a PendingCommand does nothing unless awaited"]
pub struct PendingCommand {
    rx: oneshot::Receiver<Result<CommandResult, CoreError>>,
}

impl PendingCommand {
    pub(crate) fn new(rx: oneshot::Receiver<Result<CommandResult, CoreError>>) -> Self {
        Self { rx }
    }

    /// A command that can never resolve successfully.
    pub(crate) fn released() -> Self {
        let (_, rx) = oneshot::channel();
        Self { rx }
    }
}

impl Future for PendingCommand {
    type Output = Result<CommandResult, CoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CoreError::EngineReleased)))
    }
}
