// ── Engine abstraction ──
//
// Full lifecycle management for one device connection. The Engine wraps an
// Arc<EngineInner> so it can be cheaply cloned across tasks. Attaching a
// shell link spawns the ingest task that owns all protocol state; the
// handle only talks to it through channels.

mod dispatch;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pmlink_shell::ShellLink;

use crate::bus::{EventFilter, Subscription};
use crate::command::{CommandEnvelope, CommandRequest, CommandResult, PendingCommand, Uniqueness};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{ConnectivityState, PowerStatus};

use self::dispatch::{EngineCore, Shared, ingest_task};

// ── Engine ───────────────────────────────────────────────────────────

/// The protocol engine for one device connection.
///
/// Cheaply cloneable via `Arc<EngineInner>`. A new engine is needed for
/// every connection: once released (or once its link closes) it stays
/// released.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    shared: Arc<Shared>,
    command_tx: mpsc::UnboundedSender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.inner.config.profile.model)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine. Does NOT attach -- call [`connect()`](Self::connect)
    /// with a shell link to start processing.
    ///
    /// Commands issued before attaching are queued and transmitted once a
    /// link is connected.
    pub fn new(config: EngineConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(EngineInner {
                config,
                shared: Arc::new(Shared::new()),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Access the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Attach a shell link and spawn the ingest task.
    ///
    /// An engine attaches at most once, and only with a valid configuration.
    pub async fn connect(&self, link: ShellLink) -> Result<(), CoreError> {
        if self.is_released() {
            return Err(CoreError::EngineReleased);
        }
        self.inner.config.validate()?;

        let commands = self
            .inner
            .command_rx
            .lock()
            .await
            .take()
            .ok_or(CoreError::AlreadyAttached)?;

        let (lines, sink) = link.into_parts();
        let core = EngineCore::new(self.inner.config.clone(), sink, Arc::clone(&self.inner.shared));
        let handle = tokio::spawn(ingest_task(core, lines, commands, self.inner.cancel.clone()));
        *self.inner.task.lock().await = Some(handle);

        info!(model = %self.inner.config.profile.model, "engine attached");
        Ok(())
    }

    /// Release the engine: stop ingestion, abandon outstanding commands
    /// without resolving them, and end every subscription.
    ///
    /// Idempotent.
    pub async fn release(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }

        // Never attached: drop queued commands so their callers wake up.
        self.inner.command_rx.lock().await.take();
        self.inner.shared.bus.close();
        debug!("engine released");
    }

    /// Whether the engine was released or its link closed.
    pub fn is_released(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// One-shot: attach, run closure, release.
    pub async fn oneshot<F, Fut, T>(config: EngineConfig, link: ShellLink, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Engine) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let engine = Engine::new(config);
        engine.connect(link).await?;
        let result = f(engine.clone()).await;
        engine.release().await;
        result
    }

    // ── Events ───────────────────────────────────────────────────

    /// Subscribe to every event.
    pub fn subscribe(&self) -> Subscription {
        self.inner.shared.bus.subscribe()
    }

    /// Subscribe to the events `filter` accepts.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        self.inner.shared.bus.subscribe_filtered(filter)
    }

    /// Watch connectivity changes.
    pub fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.inner.shared.connectivity.subscribe()
    }

    /// Watch USB-C and VBUS status changes.
    pub fn power(&self) -> watch::Receiver<PowerStatus> {
        self.inner.shared.power.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a command for transmission and return a handle to its result.
    ///
    /// Returns immediately; nothing is sent until the ingest task picks the
    /// request up.
    pub fn issue_command(&self, request: CommandRequest) -> PendingCommand {
        self.enqueue(request, false)
    }

    /// Issue a command and invoke `handler` exactly once with its result.
    ///
    /// A duplicate refused under [`Uniqueness::RejectDuplicate`] is reported
    /// to the handler as [`CommandResult::Error`]. The handler is never
    /// invoked if the engine is released first. Must be called within a
    /// tokio runtime.
    pub fn issue_command_with<F>(&self, request: CommandRequest, handler: F)
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        let command = request.command.clone();
        let pending = self.issue_command(request);
        tokio::spawn(async move {
            match pending.await {
                Ok(result) => handler(result),
                Err(CoreError::DuplicateCommand { command }) => {
                    handler(CommandResult::Error(format!("duplicate command '{command}' already in flight")));
                }
                Err(e) => debug!(command = %command, error = %e, "command handler not invoked"),
            }
        });
    }

    /// Issue a command and wait for its result.
    pub async fn execute(&self, request: CommandRequest) -> Result<CommandResult, CoreError> {
        self.issue_command(request).await
    }

    /// Fetch the device's diagnostic error logs.
    ///
    /// Sections are published as `DeviceEvent::ErrorLogs`; the returned
    /// handle resolves to the raw dump. Joins a fetch already in flight.
    pub fn request_error_logs(&self) -> PendingCommand {
        let request = CommandRequest::new(self.inner.config.error_log_command.clone())
            .dump()
            .unique(Uniqueness::JoinInFlight);
        self.enqueue(request, true)
    }

    fn enqueue(&self, request: CommandRequest, error_logs: bool) -> PendingCommand {
        if self.is_released() {
            return PendingCommand::released();
        }

        let (tx, rx) = oneshot::channel();
        let envelope = CommandEnvelope {
            request,
            response_tx: Some(tx),
            error_logs,
        };
        if self.inner.command_tx.send(envelope).is_err() {
            return PendingCommand::released();
        }
        PendingCommand::new(rx)
    }
}
