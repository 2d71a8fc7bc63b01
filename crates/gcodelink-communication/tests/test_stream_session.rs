use gcodelink_communication::{MockPort, MockPortHandle, StreamSession, TransportConnection};
use gcodelink_core::{ControlEvent, EventBus, EventFilter, StreamStatus};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn job_file(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn connection() -> (TransportConnection, MockPortHandle) {
    let (port, handle) = MockPort::pair("/dev/ttyMOCK");
    (
        TransportConnection::from_handle("/dev/ttyMOCK", 115_200, Box::new(port)),
        handle,
    )
}

fn recorder(bus: &EventBus) -> Arc<Mutex<Vec<ControlEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventFilter::All, move |event| {
        sink.lock().unwrap().push(event);
    });
    seen
}

#[test]
fn test_completed_stream_reports_progress_in_file_order() {
    let file = job_file(&["G21", "G90", "", "G0 X1 Y1", "M2"]);
    let (conn, port) = connection();
    let bus = Arc::new(EventBus::new());
    let seen = recorder(&bus);

    let mut session = StreamSession::new(file.path(), Duration::from_millis(1));
    session.start(conn.io(), bus.clone()).unwrap();
    assert_eq!(session.join(), StreamStatus::Completed);

    assert_eq!(port.written_lines(), vec!["G21", "G90", "G0 X1 Y1", "M2"]);
    let events = seen.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            ControlEvent::StreamProgress { line_number: 1, lines_sent: 1 },
            ControlEvent::StreamProgress { line_number: 2, lines_sent: 2 },
            ControlEvent::StreamProgress { line_number: 4, lines_sent: 3 },
            ControlEvent::StreamProgress { line_number: 5, lines_sent: 4 },
            ControlEvent::StreamCompleted { lines_sent: 4 },
        ]
    );
}

#[test]
fn test_cancel_after_second_line_stops_before_third() {
    let file = job_file(&["G0 X1", "G0 X2", "G0 X3", "G0 X4", "G0 X5"]);
    let (conn, port) = connection();
    let bus = Arc::new(EventBus::new());
    let seen = recorder(&bus);

    let mut session = StreamSession::new(file.path(), Duration::from_millis(300));
    session.start(conn.io(), bus.clone()).unwrap();
    assert!(session.is_running());

    assert!(port.wait_for_writes(2, Duration::from_secs(2)));
    session.cancel();
    let started = Instant::now();
    assert_eq!(session.join(), StreamStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(300));

    assert_eq!(port.written_lines(), vec!["G0 X1", "G0 X2"]);
    assert_eq!(session.lines_sent(), 2);
    assert_eq!(
        seen.lock().unwrap().last(),
        Some(&ControlEvent::StreamCancelled { lines_sent: 2 })
    );
}

#[test]
fn test_transport_fault_mid_stream_fails_session() {
    let file = job_file(&["G0 X1", "G0 X2", "G0 X3"]);
    let (conn, port) = connection();
    let bus = Arc::new(EventBus::new());
    let seen = recorder(&bus);

    let mut session = StreamSession::new(file.path(), Duration::from_millis(100));
    session.start(conn.io(), bus.clone()).unwrap();
    assert!(port.wait_for_writes(1, Duration::from_secs(2)));
    port.fail_writes();

    assert_eq!(session.join(), StreamStatus::Failed);
    assert_eq!(port.written_lines(), vec!["G0 X1"]);
    assert!(matches!(
        seen.lock().unwrap().last(),
        Some(ControlEvent::StreamFailed(reason)) if reason.starts_with("line 2")
    ));
}

#[test]
fn test_closed_transport_fails_session() {
    let file = job_file(&["G0 X1"]);
    let (conn, port) = connection();
    conn.close();

    let mut session = StreamSession::new(file.path(), Duration::ZERO);
    session.start(conn.io(), Arc::new(EventBus::new())).unwrap();
    assert_eq!(session.join(), StreamStatus::Failed);
    assert!(port.writes().is_empty());
}
