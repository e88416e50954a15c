//! `pmlink replay`: run a captured shell log through the engine offline.
//!
//! The capture is fed through a loopback link exactly as a live device
//! would send it. Commands the engine issues on its own (error-log fetches,
//! resets) go nowhere.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use pmlink_core::{CoreError, Engine};

use crate::cli::{GlobalOpts, ReplayArgs};
use crate::config;
use crate::error::CliError;
use crate::output::Renderer;

use super::parse_filter;

pub async fn handle(args: ReplayArgs, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    let filter = parse_filter(&args.only)?;
    let resolved = config::resolve(global)?;
    let capture = read_capture(&args.file).await?;

    let (link, device) = pmlink_shell::loopback();
    let engine = Engine::new(resolved.engine);
    let mut events = engine.subscribe_filtered(filter);
    engine.connect(link).await?;

    // The engine drains the link concurrently, so this never stalls.
    device.emit_text(&capture).await.map_err(CoreError::Transport)?;
    drop(device);

    let mut count = 0usize;
    while let Some(event) = events.recv().await {
        renderer.print(&renderer.event(&event)?);
        count += 1;
    }
    debug!(events = count, "replay finished");

    engine.release().await;
    Ok(())
}

async fn read_capture(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        Ok(text)
    } else {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}
