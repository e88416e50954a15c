//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod config_cmd;
pub mod errlog;
pub mod info;
pub mod monitor;
pub mod replay;
pub mod send;

use std::str::FromStr;

use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;

use pmlink_core::{Engine, EventFilter, EventKind};
use pmlink_shell::TransportConfig;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output::Renderer;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(args, global, renderer).await,
        Command::Send(args) => send::handle(args, global, renderer).await,
        Command::Errlog => errlog::handle(global, renderer).await,
        Command::Replay(args) => replay::handle(args, global, renderer).await,
        Command::Info => info::handle(global, renderer),
        Command::Config(args) => config_cmd::handle(args, global, renderer),
        // Completions never reach dispatch
        Command::Completions(_) => Ok(()),
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// An engine attached to the endpoint's shell bridge.
pub struct Session {
    pub engine: Engine,
    link_cancel: CancellationToken,
}

impl Session {
    /// Create the engine without attaching, so callers can subscribe first.
    pub fn engine(resolved: &Resolved) -> Engine {
        Engine::new(resolved.engine.clone())
    }

    /// Connect to the endpoint and attach `engine` to it.
    pub async fn attach(engine: Engine, resolved: &Resolved) -> Result<Self, CliError> {
        let endpoint = resolved.require_endpoint()?;
        let link_cancel = CancellationToken::new();

        let link = pmlink_shell::stream::connect(endpoint, &TransportConfig::default(), link_cancel.clone())
            .await
            .map_err(|source| CliError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;
        engine.connect(link).await?;

        Ok(Self { engine, link_cancel })
    }

    /// Release the engine and shut the bridge connection down.
    pub async fn close(self) {
        self.engine.release().await;
        self.link_cancel.cancel();
    }
}

/// Build a subscription filter from `--only` values. Empty means everything.
pub fn parse_filter(kinds: &[String]) -> Result<EventFilter, CliError> {
    if kinds.is_empty() {
        return Ok(EventFilter::All);
    }

    let parsed = kinds
        .iter()
        .map(|raw| {
            EventKind::from_str(raw.trim()).map_err(|_| CliError::Validation {
                field: "only".into(),
                reason: format!("unknown event kind '{raw}', expected one of: {}", known_kinds()),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EventFilter::kinds(parsed))
}

fn known_kinds() -> String {
    EventKind::iter()
        .map(|kind| kind.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
