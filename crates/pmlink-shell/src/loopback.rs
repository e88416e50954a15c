//! In-memory shell adapter.
//!
//! [`loopback`] returns a [`ShellLink`] wired to a [`LoopbackDevice`] that
//! plays the device side: it emits lines into the link and observes every
//! command the host transmits. Used for offline replay of captured logs and
//! throughout the test suites.

use tokio::sync::mpsc;

use crate::error::Error;
use crate::transport::{LINE_CHANNEL_CAPACITY, ShellLink, ShellSink, sanitize_line};

/// Create a connected link/device pair.
pub fn loopback() -> (ShellLink, LoopbackDevice) {
    loopback_with_capacity(LINE_CHANNEL_CAPACITY)
}

/// Create a connected link/device pair with a custom line queue capacity.
pub fn loopback_with_capacity(capacity: usize) -> (ShellLink, LoopbackDevice) {
    let (lines_tx, lines_rx) = mpsc::channel(capacity.max(1));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let link = ShellLink::new(lines_rx, ShellSink::new(commands_tx));
    let device = LoopbackDevice {
        lines: lines_tx,
        commands: commands_rx,
    };
    (link, device)
}

/// Device side of a loopback link.
///
/// Dropping it closes the link, which the engine treats as a disconnect.
#[derive(Debug)]
pub struct LoopbackDevice {
    lines: mpsc::Sender<String>,
    commands: mpsc::UnboundedReceiver<String>,
}

impl LoopbackDevice {
    /// Emit one line, waiting for queue space.
    pub async fn emit(&self, line: impl AsRef<str>) -> Result<(), Error> {
        self.lines
            .send(sanitize_line(line.as_ref()))
            .await
            .map_err(|_| Error::LinkClosed)
    }

    /// Emit one line without waiting. Fails if the queue is full or closed.
    pub fn try_emit(&self, line: impl AsRef<str>) -> Result<(), Error> {
        self.lines
            .try_send(sanitize_line(line.as_ref()))
            .map_err(|_| Error::LinkClosed)
    }

    /// Emit every line of a multi-line text block in order.
    pub async fn emit_text(&self, text: &str) -> Result<(), Error> {
        for line in text.lines() {
            self.emit(line).await?;
        }
        Ok(())
    }

    /// Wait for the next transmitted command.
    pub async fn next_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// The next transmitted command, if one is already queued.
    pub fn try_next_command(&mut self) -> Option<String> {
        self.commands.try_recv().ok()
    }

    /// Drain every command transmitted so far.
    pub fn drain_commands(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            out.push(command);
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn lines_flow_to_link_and_commands_flow_back() {
        let (mut link, mut device) = loopback();

        device.emit("\u{1b}[0m[00:00:00.010,000] <inf> module_pmic: up").await.unwrap();
        device.emit_text("RSTCAUSE:\n  SHIPMODE\n").await.unwrap();

        assert_eq!(
            link.next_line().await.as_deref(),
            Some("[00:00:00.010,000] <inf> module_pmic: up")
        );
        assert_eq!(link.next_line().await.as_deref(), Some("RSTCAUSE:"));
        assert_eq!(link.next_line().await.as_deref(), Some("  SHIPMODE"));

        let sink = link.sink();
        sink.transmit("kernel reboot cold").unwrap();
        sink.transmit("npmx errlog get").unwrap();
        assert_eq!(device.next_command().await.as_deref(), Some("kernel reboot cold"));
        assert_eq!(device.drain_commands(), vec!["npmx errlog get".to_string()]);
        assert!(device.try_next_command().is_none());
    }

    #[tokio::test]
    async fn dropping_device_closes_link() {
        let (mut link, device) = loopback();
        drop(device);
        assert!(link.next_line().await.is_none());
        assert!(link.sink().is_closed());
    }

    #[test]
    fn try_emit_fails_when_full() {
        let (_link, device) = loopback_with_capacity(1);
        device.try_emit("one").unwrap();
        assert!(matches!(device.try_emit("two"), Err(Error::LinkClosed)));
    }
}
