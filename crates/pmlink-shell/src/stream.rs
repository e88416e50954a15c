//! Byte-stream shell adapter.
//!
//! Wraps any `AsyncRead` + `AsyncWrite` pair (typically a TCP connection to
//! a serial bridge such as `ser2net`) in a [`ShellLink`]. Two background
//! tasks own the halves of the stream: the reader splits incoming bytes into
//! sanitised lines, the writer drains queued commands.
//!
//! # Example
//!
//! ```rust,ignore
//! use pmlink_shell::{TransportConfig, stream};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut link = stream::connect_tcp("127.0.0.1:4000", &TransportConfig::default(), cancel.clone()).await?;
//! link.sink().transmit("npmx errlog get")?;
//!
//! while let Some(line) = link.next_line().await {
//!     println!("{line}");
//! }
//!
//! cancel.cancel();
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, Decoder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::{ShellLink, ShellSink, TransportConfig, sanitize_line};

// ── Connecting ───────────────────────────────────────────────────────

/// Connect to an endpoint URL. Only `tcp://host:port` is supported.
pub async fn connect(
    endpoint: &Url,
    config: &TransportConfig,
    cancel: CancellationToken,
) -> Result<ShellLink, Error> {
    if endpoint.scheme() != "tcp" {
        return Err(Error::UnsupportedScheme {
            scheme: endpoint.scheme().to_owned(),
        });
    }

    let host = endpoint.host_str().ok_or_else(|| Error::Connect {
        endpoint: endpoint.to_string(),
        reason: "missing host".into(),
    })?;
    let port = endpoint.port().ok_or_else(|| Error::Connect {
        endpoint: endpoint.to_string(),
        reason: "missing port".into(),
    })?;

    connect_tcp(&format!("{host}:{port}"), config, cancel).await
}

/// Open a TCP connection to a shell bridge and spawn the link tasks.
pub async fn connect_tcp(
    addr: &str,
    config: &TransportConfig,
    cancel: CancellationToken,
) -> Result<ShellLink, Error> {
    tracing::info!(addr, "Connecting to shell bridge");

    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout {
            endpoint: addr.to_owned(),
            timeout_secs: config.connect_timeout.as_secs(),
        })?
        .map_err(|e| Error::Connect {
            endpoint: addr.to_owned(),
            reason: e.to_string(),
        })?;

    // Commands are short and latency matters more than throughput.
    stream.set_nodelay(true)?;

    tracing::info!(addr, "Shell bridge connected");

    let (reader, writer) = stream.into_split();
    Ok(spawn_stream(reader, writer, config, cancel))
}

/// Spawn reader and writer tasks over an arbitrary byte stream.
///
/// Must be called from within a tokio runtime.
pub fn spawn_stream<R, W>(
    reader: R,
    writer: W,
    config: &TransportConfig,
    cancel: CancellationToken,
) -> ShellLink
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (lines_tx, lines_rx) = mpsc::channel(config.line_capacity.max(1));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), config.max_line_length.max(1));
    tokio::spawn(read_loop(reader, codec, lines_tx, cancel.clone()));
    tokio::spawn(write_loop(
        writer,
        commands_rx,
        config.line_ending.clone(),
        cancel,
    ));

    ShellLink::new(lines_rx, ShellSink::new(commands_tx))
}

// ── Background tasks ─────────────────────────────────────────────────

/// Read until EOF, error, cancellation, or the link being dropped.
///
/// Lines over the codec's length bound are dropped whole; reading resumes
/// at the next newline.
async fn read_loop<R>(
    mut reader: R,
    mut codec: AnyDelimiterCodec,
    lines_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);

    loop {
        match codec.decode(&mut buf) {
            Ok(Some(chunk)) => {
                if !forward(&chunk, &lines_tx).await {
                    tracing::debug!("Shell link dropped, stopping reader");
                    break;
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Discarding overlong shell line");
                continue;
            }
        }

        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                if let Ok(Some(chunk)) = codec.decode_eof(&mut buf) {
                    forward(&chunk, &lines_tx).await;
                }
                tracing::info!("Shell stream ended");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Shell read failed");
                break;
            }
        }
    }
}

/// Sanitise and queue one raw line. Returns `false` once the link is gone.
async fn forward(raw: &[u8], lines_tx: &mpsc::Sender<String>) -> bool {
    let line = sanitize_line(&String::from_utf8_lossy(raw));
    if line.is_empty() {
        return true;
    }
    tracing::trace!(line = %line, "shell line");
    lines_tx.send(line).await.is_ok()
}

/// Write queued commands until the sinks are dropped or the link is cancelled.
async fn write_loop<W>(
    mut writer: W,
    mut commands_rx: mpsc::UnboundedReceiver<String>,
    line_ending: String,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = commands_rx.recv() => command,
        };
        let Some(command) = command else { break };

        tracing::debug!(command = %command, "transmitting");
        let framed = format!("{command}{line_ending}");
        let result = async {
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, command = %command, "Shell write failed");
            break;
        }
    }

    let _ = writer.shutdown().await;
    tracing::debug!("Shell writer exiting");
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, duplex};

    use super::*;

    #[tokio::test]
    async fn reads_sanitised_lines_and_skips_blank_ones() {
        let (device, host) = duplex(1024);
        let (host_read, host_write) = tokio::io::split(host);
        let (mut device_read, mut device_write) = tokio::io::split(device);

        let cancel = CancellationToken::new();
        let mut link = spawn_stream(host_read, host_write, &TransportConfig::default(), cancel.clone());

        device_write
            .write_all(b"\x1b[1;32m[00:00:01.000,000] <inf> module_pmic: hello\x1b[0m\r\n\r\nsecond\n")
            .await
            .unwrap();

        assert_eq!(
            link.next_line().await.as_deref(),
            Some("[00:00:01.000,000] <inf> module_pmic: hello")
        );
        assert_eq!(link.next_line().await.as_deref(), Some("second"));

        link.sink().transmit("npmx errlog get").unwrap();
        let mut received = [0u8; 17];
        device_read.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"npmx errlog get\r\n");

        cancel.cancel();
    }

    #[tokio::test]
    async fn link_ends_when_stream_closes() {
        let (device, host) = duplex(64);
        let (host_read, host_write) = tokio::io::split(host);

        let mut link = spawn_stream(
            host_read,
            host_write,
            &TransportConfig::default(),
            CancellationToken::new(),
        );

        drop(device);
        assert!(link.next_line().await.is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (device, host) = duplex(64);
        let (host_read, host_write) = tokio::io::split(host);
        let (_device_read, mut device_write) = tokio::io::split(device);

        let mut link = spawn_stream(
            host_read,
            host_write,
            &TransportConfig::default(),
            CancellationToken::new(),
        );

        device_write.write_all(b"ok\xff\n").await.unwrap();
        assert_eq!(link.next_line().await.as_deref(), Some("ok\u{fffd}"));
    }

    #[tokio::test]
    async fn overlong_lines_are_dropped() {
        let (device, host) = duplex(256);
        let (host_read, host_write) = tokio::io::split(host);
        let (_device_read, mut device_write) = tokio::io::split(device);

        let config = TransportConfig {
            max_line_length: 16,
            ..TransportConfig::default()
        };
        let mut link = spawn_stream(host_read, host_write, &config, CancellationToken::new());

        device_write
            .write_all(b"this line is far too long for the bound\nshort\n")
            .await
            .unwrap();
        assert_eq!(link.next_line().await.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_delivered() {
        let (device, host) = duplex(64);
        let (host_read, host_write) = tokio::io::split(host);

        let mut link = spawn_stream(
            host_read,
            host_write,
            &TransportConfig::default(),
            CancellationToken::new(),
        );

        let (device_read, mut device_write) = tokio::io::split(device);
        device_write.write_all(b"uart:~$ ").await.unwrap();
        drop(device_write);
        drop(device_read);
        assert_eq!(link.next_line().await.as_deref(), Some("uart:~$"));
        assert!(link.next_line().await.is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_scheme() {
        let url: Url = "serial:///dev/ttyACM0".parse().unwrap();
        let err = connect(&url, &TransportConfig::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "serial"));
        assert!(!err.is_transient());
    }
}
