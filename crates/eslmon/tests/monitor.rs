//! Monitor integration tests
//!
//! Drives full runs against a scripted event socket peer, over an in-memory
//! duplex stream and over real TCP.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
    ReadHalf, WriteHalf,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use esl_protocol::{ProtocolError, ReplyError};
use eslmon::{output, CommandError, Dialer, Event, Monitor, MonitorError, Shutdown};

const PASSWORD: &str = "ClueCon";

/// Hands out one pre-connected in-memory stream
struct DuplexDialer {
    stream: Mutex<Option<DuplexStream>>,
}

#[async_trait]
impl Dialer for DuplexDialer {
    type Stream = DuplexStream;

    async fn dial(&self, _address: &str) -> io::Result<DuplexStream> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "already dialed"))
    }
}

/// Server side of the event socket, scripted by each test
struct FakePeer<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> FakePeer<S> {
    fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, frame: &str) {
        self.writer.write_all(frame.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn reply(&mut self, text: &str) {
        self.send(&format!("Content-Type: command/reply\nReply-Text: {text}\n\n"))
            .await;
    }

    async fn expect_command(&mut self) -> String {
        let mut command = String::new();
        self.reader.read_line(&mut command).await.unwrap();
        let mut blank = String::new();
        self.reader.read_line(&mut blank).await.unwrap();
        assert_eq!(blank, "\n", "command {:?} not terminated", command);
        command.trim_end().to_string()
    }

    async fn accept(&mut self) {
        self.send("Content-Type: auth/request\n\n").await;
        assert_eq!(self.expect_command().await, format!("auth {PASSWORD}"));
        self.reply("+OK accepted").await;
    }

    async fn expect_subscription(&mut self, expected: &str) {
        assert_eq!(self.expect_command().await, expected);
        self.reply("+OK event listener enabled plain").await;
    }

    async fn event(&mut self, headers: &[(&str, &str)]) {
        let body = serde_json::to_string(&headers.iter().copied().collect::<BTreeMap<_, _>>())
            .unwrap();
        self.send(&format!(
            "Content-Type: text/event-plain\nContent-Length: {}\n\n{}",
            body.len(),
            body
        ))
        .await;
    }

    async fn disconnect(&mut self) {
        self.send("Content-Type: text/disconnect-notice\nContent-Length: 0\n\n")
            .await;
    }

    async fn read_rest(&mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        self.reader.read_to_end(&mut rest).await.unwrap();
        rest
    }
}

fn connect() -> (DuplexDialer, FakePeer<DuplexStream>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let dialer = DuplexDialer {
        stream: Mutex::new(Some(client)),
    };
    (dialer, FakePeer::new(server))
}

fn monitor() -> Monitor {
    Monitor::new("pbx.test", PASSWORD).unwrap()
}

fn spawn_run(
    monitor: Monitor,
    dialer: DuplexDialer,
    shutdown: &Shutdown,
) -> JoinHandle<Result<Infallible, MonitorError>> {
    let shutdown = shutdown.clone();
    tokio::spawn(async move { monitor.run_with(&dialer, &shutdown).await })
}

async fn drain(mut rx: mpsc::Receiver<Event>) -> Vec<String> {
    let mut sequences = Vec::new();
    while let Some(event) = rx.recv().await {
        sequences.push(event.get("Event-Sequence").to_string());
    }
    sequences
}

#[tokio::test]
async fn test_events_fan_out_in_order() {
    let (dialer, mut peer) = connect();
    let (heartbeat_tx, heartbeat_rx) = mpsc::channel(8);
    let (all_tx, all_rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor
        .subscribe(heartbeat_tx, ["HEARTBEAT"])
        .unwrap()
        .subscribe(all_tx, ["*"])
        .unwrap();

    let run = spawn_run(monitor, dialer, &Shutdown::new());

    peer.accept().await;
    peer.expect_subscription("event plain ALL").await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "1")])
        .await;
    peer.event(&[("Event-Name", "CHANNEL_CREATE"), ("Event-Sequence", "2")])
        .await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "3")])
        .await;
    peer.disconnect().await;

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(reason, MonitorError::ServerClosed));
    assert_eq!(reason.to_string(), "server closed: end of stream");

    assert_eq!(drain(heartbeat_rx).await, vec!["1", "3"]);
    assert_eq!(drain(all_rx).await, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_custom_subclass_filter() {
    let (dialer, mut peer) = connect();
    let (tx, rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor
        .subscribe(tx, ["CUSTOM conference::maintenance"])
        .unwrap();

    let run = spawn_run(monitor, dialer, &Shutdown::new());

    peer.accept().await;
    peer.expect_subscription("event plain CUSTOM conference::maintenance")
        .await;
    peer.event(&[
        ("Event-Name", "CUSTOM"),
        ("Event-Subclass", "sofia::register"),
        ("Event-Sequence", "1"),
    ])
    .await;
    peer.event(&[
        ("Event-Name", "CUSTOM"),
        ("Event-Subclass", "conference::maintenance"),
        ("Event-Sequence", "2"),
    ])
    .await;
    peer.disconnect().await;

    assert!(matches!(
        run.await.unwrap(),
        Err(MonitorError::ServerClosed)
    ));
    assert_eq!(drain(rx).await, vec!["2"]);
}

#[tokio::test]
async fn test_access_denied() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.send("Content-Type: text/rude-rejection\nContent-Length: 0\n\n")
        .await;

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(
        reason,
        MonitorError::Authenticate(CommandError::AccessDenied)
    ));
    assert_eq!(reason.to_string(), "authenticate: access denied");
}

#[tokio::test]
async fn test_invalid_password() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.send("Content-Type: auth/request\n\n").await;
    assert_eq!(peer.expect_command().await, "auth ClueCon");
    peer.reply("-ERR invalid").await;

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(
        reason,
        MonitorError::Authenticate(CommandError::InvalidPassword)
    ));
}

#[tokio::test]
async fn test_subscription_rejected() {
    let (dialer, mut peer) = connect();
    let (tx, _rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor.subscribe(tx, ["HEARTBEAT"]).unwrap();
    let run = spawn_run(monitor, dialer, &Shutdown::new());

    peer.accept().await;
    assert_eq!(peer.expect_command().await, "event plain HEARTBEAT");
    peer.reply("-ERR no such event").await;

    match run.await.unwrap() {
        Err(MonitorError::SubscribeRejected(ReplyError::Command(message))) => {
            assert_eq!(message, "no such event");
        }
        other => panic!("Expected subscription rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_subscribers_sends_no_command() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.accept().await;
    peer.event(&[("Event-Name", "HEARTBEAT")]).await;
    peer.disconnect().await;

    assert!(matches!(
        run.await.unwrap(),
        Err(MonitorError::ServerClosed)
    ));
    // the monitor dropped its end: nothing else was written
    assert!(peer.read_rest().await.is_empty());
}

#[tokio::test]
async fn test_cancel_during_read_reports_cause() {
    let (dialer, mut peer) = connect();
    let (tx, mut rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor.subscribe(tx, Vec::<String>::new()).unwrap();

    let shutdown = Shutdown::new();
    let run = spawn_run(monitor, dialer, &shutdown);

    peer.accept().await;
    peer.expect_subscription("event plain ALL").await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "1")])
        .await;

    // once the event is delivered the run is back waiting on the next frame
    assert_eq!(rx.recv().await.unwrap().sequence(), 1);
    shutdown.cancel_with("the end");

    let reason = run.await.unwrap().unwrap_err();
    assert_eq!(reason.cancel_cause().map(|c| c.as_str()), Some("the end"));
    assert_eq!(reason.to_string(), "done: the end");
    assert!(peer.read_rest().await.is_empty());
}

#[tokio::test]
async fn test_cancel_while_subscriber_is_full() {
    let (dialer, mut peer) = connect();
    let (tx, mut rx) = mpsc::channel(1);

    let mut monitor = monitor();
    monitor.subscribe(tx, ["HEARTBEAT"]).unwrap();

    let shutdown = Shutdown::new();
    let run = spawn_run(monitor, dialer, &shutdown);

    peer.accept().await;
    peer.expect_subscription("event plain HEARTBEAT").await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "1")])
        .await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "2")])
        .await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.sequence(), 1);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.sequence(), 2);

    // event 3 fills the channel, event 4 blocks delivery
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "3")])
        .await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "4")])
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.cancel_with("stalled");

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(&reason, MonitorError::Cancelled(cause) if cause.as_str() == "stalled"));

    // only the event that fit in the channel was delivered
    assert_eq!(rx.recv().await.unwrap().sequence(), 3);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_output_failure_stops_run() {
    let (dialer, mut peer) = connect();
    let (tx, rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor.subscribe(tx, ["HEARTBEAT"]).unwrap();

    let shutdown = Shutdown::new();
    let (out, reader) = tokio::io::duplex(64);
    drop(reader);
    let printer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { output::write_events(rx, out, &shutdown).await })
    };
    let run = spawn_run(monitor, dialer, &shutdown);

    peer.accept().await;
    peer.expect_subscription("event plain HEARTBEAT").await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "1")])
        .await;

    assert!(printer.await.unwrap().is_err());
    let reason = run.await.unwrap().unwrap_err();
    assert_eq!(
        reason.cancel_cause().map(|c| c.as_str()),
        Some(output::OUTPUT_CLOSED)
    );
    assert!(peer.read_rest().await.is_empty());
}

#[tokio::test]
async fn test_other_event_encodings_are_skipped() {
    let (dialer, mut peer) = connect();
    let (tx, rx) = mpsc::channel(8);

    let mut monitor = monitor();
    monitor.subscribe(tx, ["*"]).unwrap();
    let run = spawn_run(monitor, dialer, &Shutdown::new());

    peer.accept().await;
    peer.expect_subscription("event plain ALL").await;
    let body = r#"{"Event-Name":"HEARTBEAT"}"#;
    peer.send(&format!(
        "Content-Type: text/event-json\nContent-Length: {}\n\n{}",
        body.len(),
        body
    ))
    .await;
    peer.event(&[("Event-Name", "HEARTBEAT"), ("Event-Sequence", "2")])
        .await;
    peer.disconnect().await;

    assert!(matches!(
        run.await.unwrap(),
        Err(MonitorError::ServerClosed)
    ));
    assert_eq!(drain(rx).await, vec!["2"]);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout() {
    let (dialer, _peer) = connect();
    let monitor = monitor().with_command_timeout(Duration::from_secs(1));

    let run = spawn_run(monitor, dialer, &Shutdown::new());

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(
        reason,
        MonitorError::Authenticate(CommandError::Timeout)
    ));
    assert_eq!(reason.to_string(), "authenticate: timeout");
}

#[tokio::test(start_paused = true)]
async fn test_zero_command_timeout_waits_for_cancel() {
    let (dialer, _peer) = connect();
    let monitor = monitor().with_command_timeout(Duration::ZERO);

    let shutdown = Shutdown::new();
    let run = spawn_run(monitor, dialer, &shutdown);
    shutdown.cancel_after(Duration::from_secs(60), "deadline");

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(
        &reason,
        MonitorError::Authenticate(CommandError::Cancelled(cause)) if cause.as_str() == "deadline"
    ));
    assert!(reason.is_cancelled());
}

#[tokio::test]
async fn test_malformed_frame_is_fatal() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.accept().await;
    peer.send("this is not a header\n\n").await;

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(
        reason,
        MonitorError::Read(ProtocolError::MalformedHeader(_))
    ));
}

#[tokio::test]
async fn test_undecodable_event_is_fatal() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.accept().await;
    peer.send("Content-Type: text/event-plain\nContent-Length: 8\n\nnot json")
        .await;

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(reason, MonitorError::EventDecode(_)));
}

#[tokio::test]
async fn test_peer_closes_mid_stream() {
    let (dialer, mut peer) = connect();
    let run = spawn_run(monitor(), dialer, &Shutdown::new());

    peer.accept().await;
    drop(peer);

    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(reason, MonitorError::Read(ProtocolError::Closed)));
}

#[tokio::test]
async fn test_cancelled_before_dial() {
    let shutdown = Shutdown::new();
    shutdown.cancel();

    let reason = monitor().run(&shutdown).await.unwrap_err();
    assert_eq!(
        reason.cancel_cause().map(|c| c.as_str()),
        Some("operation canceled")
    );
}

#[tokio::test]
async fn test_dial_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let monitor = Monitor::new(&address, PASSWORD).unwrap();
    let reason = monitor.run(&Shutdown::new()).await.unwrap_err();
    match reason {
        MonitorError::Dial { address: failed, .. } => assert_eq!(failed, address),
        other => panic!("Expected dial error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = FakePeer::new(stream);
        peer.accept().await;
        peer.expect_subscription("event plain HEARTBEAT").await;
        peer.event(&[
            ("Event-Name", "HEARTBEAT"),
            ("Event-Sequence", "7"),
            ("Job-UUID", "7f4db78a-17d7-11dd-b7a0-db4edd065621"),
        ])
        .await;
        peer.read_rest().await
    });

    let (tx, mut rx) = mpsc::channel(8);
    let mut monitor = Monitor::new(&address, PASSWORD).unwrap();
    monitor.subscribe(tx, ["HEARTBEAT"]).unwrap();

    let shutdown = Shutdown::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { monitor.run(&shutdown).await })
    };

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name(), "HEARTBEAT");
    assert_eq!(event.sequence(), 7);
    assert_eq!(event.job_uuid(), Some("7f4db78a-17d7-11dd-b7a0-db4edd065621"));

    shutdown.cancel_with("test complete");
    let reason = run.await.unwrap().unwrap_err();
    assert!(matches!(&reason, MonitorError::Cancelled(cause) if cause.as_str() == "test complete"));

    // the connection is closed once the run returns
    assert!(server.await.unwrap().is_empty());
}
