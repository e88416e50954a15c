//! `pmlink monitor`: stream decoded events until interrupted.

use std::time::Duration;

use tracing::info;

use crate::cli::{GlobalOpts, MonitorArgs};
use crate::config;
use crate::error::CliError;
use crate::output::Renderer;

use super::{Session, parse_filter};

pub async fn handle(args: MonitorArgs, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    let filter = parse_filter(&args.only)?;
    let resolved = config::resolve(global)?;

    let engine = Session::engine(&resolved);
    let mut events = engine.subscribe_filtered(filter);
    let session = Session::attach(engine, &resolved).await?;

    let stop = stop_after(args.duration.map(Duration::from_secs));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(stop, interrupted);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => match renderer.event(&event) {
                    Ok(text) => renderer.print(&text),
                    Err(e) => break Err(e),
                },
                None => {
                    info!("shell link closed");
                    break Ok(());
                }
            },
            () = &mut stop => break Ok(()),
            _ = &mut interrupted => break Ok(()),
        }
    };

    session.close().await;
    outcome
}

async fn stop_after(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
