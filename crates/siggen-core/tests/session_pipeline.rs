//! End-to-end tests of the receive pipeline: mock transport -> pump ->
//! listener -> session transaction.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use siggen_core::protocol::mock::MockTransport;
use siggen_core::protocol::{
    DeviceSession, FlowControl, Parity, PortSettings, Status, StatusSink,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn settings() -> PortSettings {
    PortSettings {
        default_port_name: "ttyUSB0".to_string(),
        baud_rate: 57600,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
        flow_control: FlowControl::DISABLED,
    }
}

fn recording_sink() -> (StatusSink, Arc<Mutex<Vec<(Status, String)>>>) {
    let events: Arc<Mutex<Vec<(Status, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let sink: StatusSink = Arc::new(move |status, msg: &str| {
        events_clone.lock().push((status, msg.to_string()));
    });
    (sink, events)
}

fn online_session() -> (DeviceSession, MockTransport, Arc<Mutex<Vec<(Status, String)>>>) {
    init_tracing();
    let (sink, events) = recording_sink();
    let mut session = DeviceSession::new("TEST", settings(), sink);
    let mock = MockTransport::new();
    session.attach_transport(Box::new(mock.clone()));
    events.lock().clear();
    (session, mock, events)
}

#[test]
fn reply_split_across_chunks_is_assembled() {
    let (mut session, mock, _) = online_session();
    mock.script_replies(&[b":r1f000", b"88000\n"]);
    let reply = session.request_reply(":r1f\n");
    assert_eq!(reply, Some(":r1f00088000".to_string()));
    assert_eq!(mock.written_string(), ":r1f\n");
}

#[test]
fn stale_data_is_flushed_before_a_request() {
    let (mut session, mock, _) = online_session();
    mock.push_read(b"stale reply\n");
    // Let the pump deliver the stale line before the next transaction
    thread::sleep(Duration::from_millis(100));
    mock.script_reply(b"fresh\n");
    assert_eq!(session.request_reply("REQ\n"), Some("fresh".to_string()));
}

#[test]
fn connected_status_names_device_and_transport() {
    let (sink, events) = recording_sink();
    let mut session = DeviceSession::new("TEST", settings(), sink);
    session.attach_transport(Box::new(MockTransport::new()));
    let log = events.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, Status::Online);
    assert_eq!(log[0].1, "connected TEST on mock");
}

#[test]
fn disconnect_is_idempotent_with_distinct_message() {
    let (mut session, _mock, events) = online_session();
    session.disconnect();
    session.disconnect();
    let log = events.lock();
    assert_eq!(
        log.as_slice(),
        &[
            (Status::Offline, "disconnected".to_string()),
            (Status::Offline, "already offline".to_string()),
        ]
    );
}

#[test]
fn observers_see_both_directions() {
    let (mut session, mock, _) = online_session();
    let inbound: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let outbound: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let inbound_clone = Arc::clone(&inbound);
    let outbound_clone = Arc::clone(&outbound);
    session.add_data_observer(Box::new(move |chunk| {
        inbound_clone.lock().push(chunk.to_string());
    }));
    session.add_output_observer(Box::new(move |text| {
        outbound_clone.lock().push(text.to_string());
    }));

    mock.script_reply(b"pong\n");
    assert_eq!(session.request_reply("ping\n"), Some("pong".to_string()));
    assert_eq!(outbound.lock().as_slice(), &["ping\n".to_string()]);
    // Inbound observers receive the raw chunk, terminator included
    assert_eq!(inbound.lock().as_slice(), &["pong\n".to_string()]);
}

#[test]
fn write_failure_surfaces_as_error_status_and_absence() {
    let (mut session, mock, events) = online_session();
    mock.set_fail_writes(true);
    assert_eq!(session.request_reply("REQ\n"), None);
    assert!(events
        .lock()
        .iter()
        .any(|(s, m)| *s == Status::Error && m == "write error"));
}

#[test]
fn closed_transport_reports_port_not_open() {
    let (mut session, mock, events) = online_session();
    mock.close();
    assert!(!session.write_text("REQ\n"));
    assert!(!session.is_online());
    assert_eq!(
        events.lock().last(),
        Some(&(Status::Offline, "port is not open".to_string()))
    );
}
