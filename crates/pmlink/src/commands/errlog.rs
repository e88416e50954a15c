//! `pmlink errlog`: fetch the diagnostic dump and print its sections.

use tracing::warn;

use pmlink_core::{CommandResult, EventFilter, EventKind};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output::Renderer;

use super::Session;

pub async fn handle(global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    if !resolved.engine.profile.error_logs {
        warn!(model = %resolved.engine.profile.model, "model does not keep error logs");
    }

    let engine = Session::engine(&resolved);
    let mut sections = engine.subscribe_filtered(EventFilter::kinds([EventKind::ErrorLogs]));
    let session = Session::attach(engine, &resolved).await?;

    let result = session.engine.request_error_logs().await;
    // Releasing ends the subscription once every section is queued.
    session.close().await;
    let result = result?;

    let mut printed = 0usize;
    while let Some(event) = sections.recv().await {
        renderer.print(&renderer.event(&event)?);
        printed += 1;
    }

    let command = resolved.engine.error_log_command;
    match result {
        CommandResult::Success(_) => {
            if printed == 0 {
                renderer.print("no error logs recorded");
            }
            Ok(())
        }
        CommandResult::Error(message) => Err(CliError::DeviceError { command, message }),
        CommandResult::Timeout => Err(CliError::Timeout {
            command,
            millis: resolved.engine.command_timeout.as_millis(),
        }),
    }
}
