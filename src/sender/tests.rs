//! Tests for the sender implementation.

use std::{
    collections::BTreeMap,
    io::Read,
    net::{SocketAddr, TcpListener},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use rstest::{fixture, rstest};

use crate::error::{BuildError, EmitError};

use super::{
    SenderBuilder,
    config::{SEND_FAIL_WINDOW, SenderConfig},
    core::{EmitStatus, FluentSender},
    serialise,
    transport::{Endpoint, Transport},
};

fn payload(value: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("message".to_owned(), value.to_owned())])
}

fn encoded(tag: &str, label: Option<&str>, timestamp: u64, value: &str) -> Vec<u8> {
    serialise::encode(tag, label, timestamp, &payload(value)).expect("encode record")
}

/// Address of a port that was bound and released, so connections to it are
/// refused until a listener rebinds it.
#[fixture]
fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener has address");
    drop(listener);
    addr
}

fn sender_for(addr: SocketAddr, config: SenderConfig) -> FluentSender {
    let config = config
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_timeout(Duration::from_secs(1));
    FluentSender::with_config("app", config)
}

/// Accept one connection and hand back exactly `expected` bytes read from it.
fn spawn_reader(listener: TcpListener, expected: usize) -> mpsc::Receiver<Vec<u8>> {
    let (notify_tx, notify_rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let mut bytes = vec![0u8; expected];
        stream.read_exact(&mut bytes).expect("read forwarded bytes");
        notify_tx.send(bytes).expect("send bytes");
    });
    notify_rx
}

#[rstest]
#[case("app", Some("evt"), "app.evt")]
#[case("app", None, "app")]
#[case("app", Some(""), "app")]
fn tag_composition(#[case] tag: &str, #[case] label: Option<&str>, #[case] expected: &str) {
    assert_eq!(serialise::effective_tag(tag, label), expected);
}

#[rstest]
fn encode_round_trips() {
    let bytes = encoded("app", Some("evt"), 1_700_000_000, "hello");
    let (tag, time, record): (String, u64, BTreeMap<String, String>) =
        rmp_serde::from_slice(&bytes).expect("decode message");
    assert_eq!(tag, "app.evt");
    assert_eq!(time, 1_700_000_000);
    assert_eq!(record, payload("hello"));
}

#[rstest]
fn encode_error_propagates_without_entering_retry_path(dead_addr: SocketAddr) {
    struct Unserialisable;
    impl serde::Serialize for Unserialisable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unsupported payload"))
        }
    }

    let sender = sender_for(dead_addr, SenderConfig::default());
    let err = sender
        .emit_with_time(None, 1, &Unserialisable)
        .expect_err("encoding must fail");
    assert!(matches!(err, EmitError::Encode(_)));
    assert_eq!(sender.pending_len(), 0);
    assert_eq!(sender.fail_count(), 0);
}

#[rstest]
fn failures_are_absorbed_and_buffer_concatenates(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_max_send_fail(10));

    let mut expected = Vec::new();
    for (i, value) in ["one", "two", "three"].iter().enumerate() {
        let status = sender
            .emit_with_time(Some("evt"), i as u64, &payload(value))
            .expect("failure below thresholds must be absorbed");
        assert_eq!(status, EmitStatus::Absorbed);
        expected.extend(encoded("app", Some("evt"), i as u64, value));
    }

    assert_eq!(sender.fail_count(), 3);
    assert_eq!(
        sender.pending_bytes(),
        expected,
        "pending buffer must equal the concatenation of all attempted records"
    );
    assert!(!sender.is_connected());
}

#[rstest]
fn count_threshold_escalates_and_resets_episode(dead_addr: SocketAddr) {
    let sender = sender_for(
        dead_addr,
        SenderConfig::default()
            .with_bufmax(1000)
            .with_max_send_fail(3),
    );

    for i in 0..3u64 {
        let status = sender
            .emit_with_time(None, i, &payload("x"))
            .expect("first three failures must be absorbed");
        assert_eq!(status, EmitStatus::Absorbed);
    }

    let err = sender
        .emit_with_time(None, 3, &payload("x"))
        .expect_err("fourth consecutive failure must escalate");
    assert!(matches!(
        err,
        EmitError::TooManyFailures { attempts: 4, .. }
    ));

    // Episode resets, the accumulated bytes stay pending for the next call.
    assert_eq!(sender.fail_count(), 0);
    let expected: usize = (0..4u64)
        .map(|i| encoded("app", None, i, "x").len())
        .sum();
    assert_eq!(sender.pending_len(), expected);
}

#[rstest]
fn window_threshold_escalates_and_clears_anchor(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_max_send_fail(100));
    let t0 = Instant::now();

    let status = sender
        .submit_at(encoded("app", None, 0, "x"), t0)
        .expect("first failure must be absorbed");
    assert_eq!(status, EmitStatus::Absorbed);

    let late = t0 + SEND_FAIL_WINDOW + Duration::from_secs(1);
    let err = sender
        .submit_at(encoded("app", None, 1, "x"), late)
        .expect_err("failure beyond the window must escalate");
    assert!(matches!(err, EmitError::FailureWindowExpired { .. }));
    assert_eq!(sender.fail_count(), 0);

    // The anchor was cleared, so the next failure starts a fresh episode
    // and is absorbed even at the same late instant.
    let status = sender
        .submit_at(encoded("app", None, 2, "x"), late)
        .expect("fresh episode must absorb");
    assert_eq!(status, EmitStatus::Absorbed);
}

#[rstest]
fn overflow_drops_entire_buffer(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_bufmax(64));

    let big = "x".repeat(200);
    let err = sender
        .emit_with_time(None, 0, &payload(&big))
        .expect_err("oversized buffer must escalate");
    assert!(matches!(
        err,
        EmitError::BufferOverflow { bufmax: 64, .. }
    ));
    assert_eq!(sender.pending_len(), 0, "buffer must be dropped, not capped");
    assert_eq!(sender.fail_count(), 0);
}

#[rstest]
fn success_after_absorbed_failures_drains_buffer(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_max_send_fail(10));

    let mut expected = Vec::new();
    for i in 0..2u64 {
        sender
            .emit_with_time(None, i, &payload("buffered"))
            .expect("failures must be absorbed");
        expected.extend(encoded("app", None, i, "buffered"));
    }
    expected.extend(encoded("app", None, 2, "buffered"));

    let listener = TcpListener::bind(dead_addr).expect("rebind released port");
    let notify_rx = spawn_reader(listener, expected.len());

    let status = sender
        .emit_with_time(None, 2, &payload("buffered"))
        .expect("send must succeed once a listener is up");
    assert_eq!(status, EmitStatus::Sent);
    assert_eq!(sender.pending_len(), 0);
    assert_eq!(sender.fail_count(), 0);

    let received = notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("forwarded bytes received");
    assert_eq!(received, expected);
}

#[rstest]
fn bytes_retained_across_escalation_are_delivered(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_max_send_fail(1));

    sender
        .emit_with_time(None, 0, &payload("kept"))
        .expect("first failure must be absorbed");
    sender
        .emit_with_time(None, 1, &payload("kept"))
        .expect_err("second failure must escalate");

    let mut expected = Vec::new();
    for i in 0..3u64 {
        expected.extend(encoded("app", None, i, "kept"));
    }

    let listener = TcpListener::bind(dead_addr).expect("rebind released port");
    let notify_rx = spawn_reader(listener, expected.len());

    let status = sender
        .emit_with_time(None, 2, &payload("kept"))
        .expect("send must succeed once a listener is up");
    assert_eq!(status, EmitStatus::Sent);

    let received = notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("forwarded bytes received");
    assert_eq!(received, expected);
}

#[rstest]
fn flush_pending_is_a_no_op_when_clean(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default());
    // No listener exists, so anything but the no-op path would be absorbed.
    let status = sender.flush_pending().expect("clean flush must succeed");
    assert_eq!(status, EmitStatus::Sent);
    assert!(!sender.is_connected());
}

#[rstest]
fn flush_pending_drains_buffered_bytes(dead_addr: SocketAddr) {
    let sender = sender_for(dead_addr, SenderConfig::default().with_max_send_fail(10));
    sender
        .emit_with_time(None, 0, &payload("queued"))
        .expect("failure must be absorbed");

    let expected = encoded("app", None, 0, "queued");
    let listener = TcpListener::bind(dead_addr).expect("rebind released port");
    let notify_rx = spawn_reader(listener, expected.len());

    let status = sender.flush_pending().expect("flush must succeed");
    assert_eq!(status, EmitStatus::Sent);
    assert_eq!(sender.pending_len(), 0);

    let received = notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("forwarded bytes received");
    assert_eq!(received, expected);
}

#[rstest]
#[case("localhost", 24224)]
#[case("203.0.113.7", 4000)]
fn endpoint_parses_tcp_hosts(#[case] host: &str, #[case] port: u16) {
    assert_eq!(
        Endpoint::from_host_port(host, port),
        Endpoint::Tcp {
            host: host.to_owned(),
            port,
        }
    );
}

#[rstest]
fn endpoint_parses_unix_prefix() {
    assert_eq!(
        Endpoint::from_host_port("unix:///var/run/fluent/fluent.sock", 24224),
        Endpoint::Unix {
            path: "/var/run/fluent/fluent.sock".into(),
        }
    );
}

#[rstest]
fn transport_connect_and_close_are_idempotent() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener has address");
    let mut transport = Transport::new(
        Endpoint::from_host_port(&addr.ip().to_string(), addr.port()),
        Duration::from_secs(1),
    );

    transport.ensure_connected().expect("connect");
    transport.ensure_connected().expect("reconnect is a no-op");
    assert!(transport.is_connected());

    transport.close();
    transport.close();
    assert!(!transport.is_connected());

    let err = transport
        .write_all(b"dropped")
        .expect_err("write without a connection must fail");
    assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
}

#[rstest]
fn builder_rejects_empty_tag() {
    let err = SenderBuilder::new("").build().expect_err("empty tag");
    assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("tag")));
}

#[rstest]
#[case("app..worker")]
#[case(".app")]
#[case("app.")]
fn builder_rejects_malformed_tags(#[case] tag: &str) {
    let err = SenderBuilder::new(tag).build().expect_err("malformed tag");
    assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("tag")));
}

#[rstest]
fn builder_rejects_zero_bufmax() {
    let err = SenderBuilder::new("app")
        .with_bufmax(0)
        .build()
        .expect_err("zero bufmax must fail");
    assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("bufmax")));
}

#[rstest]
fn builder_rejects_empty_host() {
    let err = SenderBuilder::new("app")
        .with_host("  ")
        .build()
        .expect_err("blank host must fail");
    assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("host")));
}

#[rstest]
fn builder_applies_overrides() {
    let sender = SenderBuilder::new("app.worker")
        .with_host("127.0.0.1")
        .with_port(5170)
        .with_bufmax(4096)
        .with_timeout(Duration::from_millis(500))
        .with_max_send_fail(5)
        .build()
        .expect("valid configuration");
    assert_eq!(sender.tag(), "app.worker");
}
