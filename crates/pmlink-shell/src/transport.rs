// Shared link types for every shell adapter.
//
// A `ShellLink` is one connection's worth of transport: a receiver of
// already-delimited text lines and a sink that transmits command strings.
// Adapters (TCP bridge, loopback) differ only in how they fill these.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Error;

/// Default capacity of the inbound line queue.
pub const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Default bound on one inbound line, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Shared transport configuration for building shell links.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Appended to every transmitted command.
    pub line_ending: String,
    /// Inbound line queue capacity. The reader waits when the queue is full.
    pub line_capacity: usize,
    /// Longer inbound lines are discarded up to the next newline.
    pub max_line_length: usize,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            line_ending: "\r\n".into(),
            line_capacity: LINE_CHANNEL_CAPACITY,
            max_line_length: MAX_LINE_LENGTH,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// ── ShellLink ────────────────────────────────────────────────────────

/// One connection to a device shell.
///
/// Yields sanitised lines in arrival order and vends [`ShellSink`]s for
/// transmitting commands. Dropping the link stops delivery; the adapter's
/// background tasks notice and wind down.
#[derive(Debug)]
pub struct ShellLink {
    lines: mpsc::Receiver<String>,
    sink: ShellSink,
}

impl ShellLink {
    pub(crate) fn new(lines: mpsc::Receiver<String>, sink: ShellSink) -> Self {
        Self { lines, sink }
    }

    /// A handle for transmitting commands over this link.
    pub fn sink(&self) -> ShellSink {
        self.sink.clone()
    }

    /// Wait for the next line. Returns `None` once the device side closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Split into the raw line receiver and the command sink.
    pub fn into_parts(self) -> (mpsc::Receiver<String>, ShellSink) {
        (self.lines, self.sink)
    }
}

// ── ShellSink ────────────────────────────────────────────────────────

/// Cloneable command transmitter.
///
/// Transmission is a non-blocking enqueue; the adapter's writer task owns
/// the actual byte stream and appends the configured line ending.
#[derive(Debug, Clone)]
pub struct ShellSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ShellSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Queue a command for transmission.
    pub fn transmit(&self, command: &str) -> Result<(), Error> {
        self.tx
            .send(command.to_owned())
            .map_err(|_| Error::LinkClosed)
    }

    /// Returns `true` once the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Line sanitising ──────────────────────────────────────────────────

/// Strip terminal noise from a raw shell line.
///
/// The device shell colours its output with VT100 sequences and may emit
/// stray carriage returns or backspaces. Removes CSI sequences
/// (`ESC [ … final`), two-byte escapes, and control characters other than
/// tab, then trims trailing whitespace.
pub fn sanitize_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameters and intermediates, then one final byte in @..~
                    for next in chars.by_ref() {
                        if ('@'..='~').contains(&next) {
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_color_codes() {
        let raw = "\u{1b}[1;32muart:~$ \u{1b}[mnpmx errlog get";
        assert_eq!(sanitize_line(raw), "uart:~$ npmx errlog get");
    }

    #[test]
    fn sanitize_strips_carriage_return_and_trailing_space() {
        assert_eq!(sanitize_line("RSTCAUSE:  \r"), "RSTCAUSE:");
    }

    #[test]
    fn sanitize_keeps_leading_indent() {
        assert_eq!(sanitize_line("    SHIPMODE"), "    SHIPMODE");
    }

    #[test]
    fn sanitize_handles_dangling_escape() {
        assert_eq!(sanitize_line("abc\u{1b}"), "abc");
        assert_eq!(sanitize_line("abc\u{1b}[12"), "abc");
    }

    #[test]
    fn sink_reports_closed_link() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ShellSink::new(tx);
        sink.transmit("help").unwrap();
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(sink.transmit("help"), Err(Error::LinkClosed)));
    }

    #[test]
    fn default_transport_config() {
        let config = TransportConfig::default();
        assert_eq!(config.line_ending, "\r\n");
        assert_eq!(config.line_capacity, LINE_CHANNEL_CAPACITY);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }
}
