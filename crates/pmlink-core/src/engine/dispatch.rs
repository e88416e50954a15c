// ── Line dispatch ──
//
// `EngineCore` is the single owner of all per-connection protocol state:
// timestamp reconstruction, the command correlator, the state machine and
// log grouping. The ingest task drives it one input at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use pmlink_shell::ShellSink;

use crate::bus::{DeviceEvent, EventBus};
use crate::command::correlator::{Correlator, Resolution, Submission};
use crate::command::{CommandEnvelope, CommandRequest, CommandResult, Uniqueness};
use crate::config::EngineConfig;
use crate::model::{ConnectivityState, ErrorLogKind, LoggingEvent, PowerStatus};
use crate::parser::{TimestampReconstructor, is_continuation, parse_adc_sample, parse_irq, parse_line};
use crate::segmenter;
use crate::state::{DeviceStateMachine, Effect};

/// Publication endpoints shared between the engine handle and its task.
#[derive(Debug)]
pub(crate) struct Shared {
    pub bus: EventBus,
    pub connectivity: watch::Sender<ConnectivityState>,
    pub power: watch::Sender<PowerStatus>,
}

impl Shared {
    pub fn new() -> Self {
        let (connectivity, _) = watch::channel(ConnectivityState::default());
        let (power, _) = watch::channel(PowerStatus::default());
        Self {
            bus: EventBus::new(),
            connectivity,
            power,
        }
    }
}

pub(crate) struct EngineCore {
    config: EngineConfig,
    sink: ShellSink,
    shared: Arc<Shared>,
    timestamps: TimestampReconstructor,
    correlator: Correlator,
    state: DeviceStateMachine,
    /// Head of the current log group, for indented continuation lines.
    last_log: Option<LoggingEvent>,
}

impl EngineCore {
    pub fn new(config: EngineConfig, sink: ShellSink, shared: Arc<Shared>) -> Self {
        let timestamps = TimestampReconstructor::new(config.profile.max_timestamp);
        let correlator = Correlator::new(config.command_timeout, config.dump_settle);
        let state = DeviceStateMachine::new(config.profile.clone(), config.auto_reboot);
        Self {
            config,
            sink,
            shared,
            timestamps,
            correlator,
            state,
            last_log: None,
        }
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Classify and handle one inbound line.
    pub fn on_line(&mut self, line: &str, now: Instant) {
        self.on_tick(now);

        if let Some(parsed) = parse_line(line) {
            if self.config.profile.is_known_module(parsed.module) {
                self.on_log(parsed.to_event());
            } else {
                trace!(module = parsed.module, "dropping line from unknown module");
                self.last_log = None;
            }
            return;
        }

        if let Some(echo) = line.trim_start().strip_prefix(self.config.prompt.as_str()) {
            self.last_log = None;
            if let Some(resolution) = self.correlator.on_prompt(echo) {
                self.on_resolved(resolution);
            }
            return;
        }

        if is_continuation(line) && !self.correlator.collecting() {
            if let Some(head) = &self.last_log {
                let event = LoggingEvent {
                    message: line.trim().to_owned(),
                    ..head.clone()
                };
                self.shared.bus.publish(DeviceEvent::Log { event, grouped: true });
                return;
            }
        }

        self.last_log = None;
        if line.trim().is_empty() {
            return;
        }
        if let Some(resolution) = self.correlator.on_response_line(line, now) {
            self.on_resolved(resolution);
        }
    }

    /// Register and transmit a caller's command.
    pub fn on_command(&mut self, envelope: CommandEnvelope, now: Instant) {
        self.on_tick(now);
        let CommandEnvelope {
            request,
            response_tx,
            error_logs,
        } = envelope;
        self.submit(&request, response_tx, error_logs, now);
    }

    /// Resolve whatever has settled or expired by `now`.
    pub fn on_tick(&mut self, now: Instant) {
        for resolution in self.correlator.poll_expired(now) {
            self.on_resolved(resolution);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.correlator.next_deadline()
    }

    /// The link closed: a dump cut short still delivers what it buffered.
    pub fn on_link_closed(&mut self) {
        if let Some(resolution) = self.correlator.finish_dump() {
            self.on_resolved(resolution);
        }
    }

    /// Abandon outstanding commands and end every subscription.
    pub fn shutdown(&mut self) {
        self.correlator.abandon_all();
        self.shared.bus.close();
    }

    // ── Log records ──────────────────────────────────────────────────

    fn on_log(&mut self, event: LoggingEvent) {
        self.shared.bus.publish(DeviceEvent::Log {
            event: event.clone(),
            grouped: false,
        });

        let modules = &self.config.profile.modules;
        let effects = if event.module == modules.adc {
            let timestamp = self.timestamps.logical(event.timestamp);
            let sample = parse_adc_sample(&event.message, timestamp);
            self.shared.bus.publish(DeviceEvent::AdcSample(sample));
            Vec::new()
        } else if event.module == modules.irq {
            match parse_irq(&event.message) {
                Some(irq) => {
                    let effects = self.state.on_irq(&irq);
                    self.shared.bus.publish(DeviceEvent::Irq(irq));
                    effects
                }
                None => {
                    debug!(body = %event.message, "malformed interrupt line");
                    Vec::new()
                }
            }
        } else {
            self.state.on_log(&event)
        };

        self.apply(effects);
        self.last_log = Some(event);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }

        let now = Instant::now();
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.shared.bus.publish(event),
                Effect::IssueReset => {
                    // Queued like any command so its echo is not taken for another's.
                    info!(command = %self.config.reset_command, "resetting device");
                    let request = CommandRequest::new(self.config.reset_command.clone());
                    self.submit(&request, None, false, now);
                }
                Effect::RequestErrorLogs => {
                    let request = CommandRequest::new(self.config.error_log_command.clone())
                        .dump()
                        .unique(Uniqueness::RejectDuplicate);
                    self.submit(&request, None, true, now);
                }
            }
        }

        let connectivity = self.state.connectivity();
        self.shared.connectivity.send_if_modified(|current| {
            let changed = *current != connectivity;
            *current = connectivity;
            changed
        });
        let power = self.state.power();
        self.shared.power.send_if_modified(|current| {
            let changed = *current != power;
            *current = power;
            changed
        });
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn submit(
        &mut self,
        request: &CommandRequest,
        response_tx: Option<crate::command::ResponseSender>,
        error_logs: bool,
        now: Instant,
    ) {
        match self.correlator.submit(request, response_tx, error_logs, now) {
            Submission::Transmit => {
                if let Err(e) = self.sink.transmit(&request.command) {
                    // The link is going away; the entry is abandoned with it.
                    warn!(error = %e, command = %request.command, "failed to transmit command");
                }
            }
            Submission::Joined | Submission::Rejected => {}
        }
    }

    fn on_resolved(&mut self, resolution: Resolution) {
        if !resolution.error_logs {
            return;
        }

        match resolution.result {
            CommandResult::Success(text) => {
                for section in segmenter::segment(&text) {
                    let lines = section.lines.join(", ");
                    match section.kind {
                        ErrorLogKind::ResetCause => warn!(kind = %section.kind, %lines, "device error log"),
                        ErrorLogKind::ChargerError | ErrorLogKind::SensorError => {
                            error!(kind = %section.kind, %lines, "device error log");
                        }
                    }
                    self.shared.bus.publish(DeviceEvent::ErrorLogs(section));
                }
            }
            CommandResult::Error(text) => {
                warn!(command = %resolution.command, error = %text, "error log request failed");
            }
            CommandResult::Timeout => {
                warn!(command = %resolution.command, "error log request timed out");
            }
        }
    }
}

// ── Ingest task ──────────────────────────────────────────────────────

/// Drive an `EngineCore` until cancellation or until the link closes.
///
/// Inputs are handled strictly one at a time, so every subscriber has seen
/// a line's events before the next line is looked at.
pub(crate) async fn ingest_task(
    mut core: EngineCore,
    mut lines: mpsc::Receiver<String>,
    mut commands: mpsc::UnboundedReceiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        let deadline = core.next_deadline();

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(envelope) = commands.recv() => core.on_command(envelope, Instant::now()),
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("shell link closed");
                    core.on_link_closed();
                    break;
                };
                core.on_line(&line, Instant::now());
            }
            () = sleep_until(deadline) => core.on_tick(Instant::now()),
        }
    }

    cancel.cancel();
    core.shutdown();
    debug!("ingest task exiting");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
