//! `pmlink send`: issue one shell command and print its reply.

use pmlink_core::{CommandRequest, CommandResult};

use crate::cli::{GlobalOpts, OutputFormat, SendArgs};
use crate::config;
use crate::error::CliError;
use crate::output::Renderer;

use super::Session;

pub async fn handle(args: SendArgs, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    let request = build_request(&args);
    let command = request.command.clone();
    let resolved = config::resolve(global)?;

    let session = Session::attach(Session::engine(&resolved), &resolved).await?;
    let result = session.engine.execute(request).await;
    session.close().await;
    let result = result?;

    // Structured output always carries the reply; plain text only on success.
    if result.is_success() || renderer.format != OutputFormat::Plain {
        renderer.print(&renderer.result(&command, &result)?);
    }

    match result {
        CommandResult::Success(_) => Ok(()),
        CommandResult::Error(message) => Err(CliError::DeviceError { command, message }),
        CommandResult::Timeout => Err(CliError::Timeout {
            command,
            millis: resolved.engine.command_timeout.as_millis(),
        }),
    }
}

fn build_request(args: &SendArgs) -> CommandRequest {
    let request = CommandRequest::new(args.command.join(" "));
    if args.dump {
        request.dump()
    } else if let Some(ref prefix) = args.expect {
        request.expect_prefix(prefix.clone())
    } else {
        request
    }
}
