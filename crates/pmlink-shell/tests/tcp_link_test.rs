// Integration tests for the TCP shell adapter against a local listener.
#![allow(clippy::unwrap_used)]

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

use pmlink_shell::{Error, TransportConfig, stream};

// ── Helpers ─────────────────────────────────────────────────────────

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_over_tcp() {
    let (listener, addr) = listener().await;
    let cancel = CancellationToken::new();

    let accept = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        write
            .write_all(b"[00:00:02.365,000] <inf> module_pmic_adc: vbat=3.70\r\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap()
    });

    let url: Url = format!("tcp://{addr}").parse().unwrap();
    let mut link = stream::connect(&url, &TransportConfig::default(), cancel.clone())
        .await
        .unwrap();

    assert_eq!(
        link.next_line().await.as_deref(),
        Some("[00:00:02.365,000] <inf> module_pmic_adc: vbat=3.70")
    );

    link.sink().transmit("npmx charger status get").unwrap();
    let received = accept.await.unwrap();
    assert_eq!(received.as_deref(), Some("npmx charger status get"));

    cancel.cancel();
}

#[tokio::test]
async fn test_custom_line_ending() {
    let (listener, addr) = listener().await;
    let config = TransportConfig {
        line_ending: "\n".into(),
        ..TransportConfig::default()
    };

    let accept = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);
        let mut raw = Vec::new();
        reader.read_until(b'\n', &mut raw).await.unwrap();
        raw
    });

    let link = stream::connect_tcp(&addr, &config, CancellationToken::new())
        .await
        .unwrap();
    link.sink().transmit("help").unwrap();

    assert_eq!(accept.await.unwrap(), b"help\n");
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port that is very likely closed.
    let (listener, addr) = listener().await;
    drop(listener);

    let err = stream::connect_tcp(&addr, &TransportConfig::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_endpoint_requires_port() {
    let url: Url = "tcp://localhost".parse().unwrap();
    let err = stream::connect(&url, &TransportConfig::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect { ref reason, .. } if reason == "missing port"));
}
