//! Integration tests for the poll loop.
//!
//! These tests exercise the full session (query, reply, decode, retry
//! policy, resource cleanup) against a scripted mock transport, without any
//! hardware or sockets.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use voltage_pzem::{
    crc_suffix, CodecConfig, MeterTransport, PollConfig, PzemClient, PzemError, QUERY_FRAME,
    TransportStats,
};

/// One scripted step of a mock exchange.
enum MockReply {
    Frame(Vec<u8>),
    Timeout,
    Disconnect,
}

/// Mock transport that replays a scripted sequence of replies and counts
/// how it was used.
struct MockTransport {
    replies: VecDeque<MockReply>,
    queries_sent: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
    connected: bool,
}

impl MockTransport {
    fn new(replies: Vec<MockReply>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let queries_sent = Arc::new(AtomicUsize::new(0));
        let close_calls = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            replies: replies.into(),
            queries_sent: queries_sent.clone(),
            close_calls: close_calls.clone(),
            connected: true,
        };
        (transport, queries_sent, close_calls)
    }
}

#[async_trait]
impl MeterTransport for MockTransport {
    async fn send_query(&mut self, frame: &[u8]) -> Result<(), PzemError> {
        assert_eq!(frame, QUERY_FRAME, "poll must send the fixed query frame");
        self.queries_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recv_reply(&mut self) -> Result<Vec<u8>, PzemError> {
        match self.replies.pop_front() {
            Some(MockReply::Frame(frame)) => Ok(frame),
            Some(MockReply::Timeout) | None => Err(PzemError::timeout("read reply", 1000)),
            Some(MockReply::Disconnect) => {
                self.connected = false;
                Err(PzemError::connection("Meter closed the connection"))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<(), PzemError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Build a reply frame from a 20-byte field block with a correct CRC.
fn build_frame(fields: [u8; 20]) -> Vec<u8> {
    let mut frame = vec![0x01, 0x04, 0x14];
    frame.extend_from_slice(&fields);
    let suffix = crc_suffix(&frame);
    frame.extend_from_slice(&suffix);
    frame
}

/// 230.0 V, 1.500 A, 345.0 W, 1.234 kWh, 50.0 Hz, PF 0.98.
fn good_frame() -> Vec<u8> {
    build_frame([
        0x08, 0xFC, // voltage 2300
        0x05, 0xDC, 0x00, 0x00, // current 1500, low register first
        0x0D, 0x7A, 0x00, 0x00, // power 3450
        0x04, 0xD2, 0x00, 0x00, // energy 1234
        0x01, 0xF4, // frequency 500
        0x00, 0x62, // power factor 98
        0x00, 0x00, // alert
    ])
}

/// CRC-valid frame whose power (1.0 W) cannot match 230 V x 1.5 A.
fn implausible_frame() -> Vec<u8> {
    let mut frame = good_frame();
    frame[9] = 0x00; // power 10
    frame[10] = 0x0A;
    let payload_len = frame.len() - 2;
    let suffix = crc_suffix(&frame[..payload_len]);
    frame[payload_len..].copy_from_slice(&suffix);
    frame
}

#[tokio::test]
async fn test_poll_success_first_attempt() {
    let (transport, queries, closes) = MockTransport::new(vec![MockReply::Frame(good_frame())]);
    let client = PzemClient::new(transport, PollConfig::default());

    let reading = client.poll_once().await.unwrap();
    assert_eq!(reading.voltage, 230.0);
    assert_eq!(reading.current, 1.500);
    assert_eq!(reading.power, 345.0);
    assert_eq!(reading.energy, 1.234);
    assert_eq!(reading.frequency, 50.0);
    assert_eq!(reading.power_factor, 0.98);
    assert!(!reading.alert);

    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_poll_retries_crc_mismatch_then_succeeds() {
    let mut corrupted = good_frame();
    corrupted[5] ^= 0x40;

    let (transport, queries, closes) = MockTransport::new(vec![
        MockReply::Frame(corrupted),
        MockReply::Frame(good_frame()),
    ]);
    let client = PzemClient::new(transport, PollConfig::default());

    let reading = client.poll_once().await.unwrap();
    assert_eq!(reading.voltage, 230.0);
    assert_eq!(queries.load(Ordering::SeqCst), 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_poll_retries_short_frame() {
    let (transport, queries, _closes) = MockTransport::new(vec![
        MockReply::Frame(vec![0x01, 0x04, 0x14]),
        MockReply::Frame(good_frame()),
    ]);
    let client = PzemClient::new(transport, PollConfig::default());

    assert!(client.poll_once().await.is_ok());
    assert_eq!(queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_poll_exhausted_after_exact_attempt_budget() {
    // Every attempt times out; the loop must run exactly max_attempts times.
    let (transport, queries, closes) = MockTransport::new(vec![]);
    let client = PzemClient::new(transport, PollConfig::default());

    match client.poll_once().await {
        Err(PzemError::PollExhausted { attempts: 6 }) => {}
        other => panic!("expected PollExhausted after 6 attempts, got {:?}", other),
    }
    assert_eq!(queries.load(Ordering::SeqCst), 6);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_value_retried_by_default() {
    let (transport, queries, closes) = MockTransport::new(vec![
        MockReply::Frame(implausible_frame()),
        MockReply::Frame(good_frame()),
    ]);
    let client = PzemClient::new(transport, PollConfig::default());

    assert!(client.poll_once().await.is_ok());
    assert_eq!(queries.load(Ordering::SeqCst), 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_value_surfaced_when_retry_disabled() {
    let (transport, queries, closes) = MockTransport::new(vec![
        MockReply::Frame(implausible_frame()),
        MockReply::Frame(good_frame()),
    ]);
    let config = PollConfig {
        retry_bad_value: false,
        ..PollConfig::default()
    };
    let client = PzemClient::new(transport, config);

    match client.poll_once().await {
        Err(PzemError::BadValue { power, .. }) => assert_eq!(power, 1.0),
        other => panic!("expected BadValue, got {:?}", other),
    }
    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_loss_aborts_poll() {
    let (transport, queries, closes) = MockTransport::new(vec![
        MockReply::Disconnect,
        MockReply::Frame(good_frame()),
    ]);
    let client = PzemClient::new(transport, PollConfig::default());

    match client.poll_once().await {
        Err(PzemError::Connection { .. }) => {}
        other => panic!("expected Connection error, got {:?}", other),
    }
    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_register_swap_disabled_changes_decode() {
    // Same bytes, naive group order: every 32-bit field reassembles with the
    // low-offset group as the high word.
    let (transport, _queries, _closes) =
        MockTransport::new(vec![MockReply::Frame(good_frame())]);
    let config = PollConfig {
        codec: CodecConfig {
            register_swap: false,
            ..CodecConfig::default()
        },
        ..PollConfig::default()
    };
    let client = PzemClient::new(transport, config);

    let reading = client.poll_once().await.unwrap();
    assert_eq!(reading.current, 98304.0); // 1500 << 16, /1000
    assert_eq!(reading.power, 22_609_920.0); // 3450 << 16, /10
    assert_eq!(reading.voltage, 230.0); // 16-bit fields are unaffected
}
