//! Exchange and endpoint transaction behaviour against the simulated controller.

use std::sync::Arc;

use ccxt_transport::mock::{Fault, MockController};
use ccxt_transport::protocol::{data_type, IN_FRAME_SIZE, OUT_FRAME_SIZE};
use ccxt_transport::{Command, Endpoint, ErrorKind, Session, SessionConfig, TransportError};

fn setup() -> (Arc<MockController>, Session) {
    let mock = Arc::new(MockController::new());
    let session = mock.session(SessionConfig::default());
    (mock, session)
}

#[tokio::test]
async fn command_returns_status_checked_reply() {
    let (mock, session) = setup();
    mock.set_firmware(2, 10, 0x0123);

    let reply = session.command(Command::GET_FIRMWARE).await.unwrap();
    assert_eq!(reply.status(), 0);
    assert_eq!(reply.received_len(), IN_FRAME_SIZE);
    assert_eq!(&reply.as_bytes()[3..7], &[2, 10, 0x23, 0x01]);

    let frames = mock.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), OUT_FRAME_SIZE);
    assert_eq!(&frames[0][..4], &[0x00, 0x08, 0x02, 0x13]);
    assert!(frames[0][4..].iter().all(|&b| b == 0));
}

#[tokio::test(start_paused = true)]
async fn missing_reply_times_out() {
    let (mock, session) = setup();
    mock.inject(Command::GET_FIRMWARE, Fault::NoReply);

    let err = session.command(Command::GET_FIRMWARE).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout);
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // The next exchange gets its own reply, not a stale one
    mock.set_firmware(3, 1, 7);
    let reply = session.command(Command::GET_FIRMWARE).await.unwrap();
    assert_eq!(reply.as_bytes()[3], 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_honours_configured_duration() {
    let mock = Arc::new(MockController::new());
    let session = mock.session(SessionConfig {
        reply_timeout_ms: 50,
    });
    mock.inject(Command::SOFTWARE_MODE, Fault::NoReply);

    let start = tokio::time::Instant::now();
    let err = session.command(Command::SOFTWARE_MODE).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout);
    let elapsed = start.elapsed();
    assert!(elapsed >= std::time::Duration::from_millis(50));
    assert!(elapsed < std::time::Duration::from_millis(300));
}

#[tokio::test]
async fn wrong_reply_length_is_protocol_error() {
    let (mock, session) = setup();

    mock.inject(Command::GET_FIRMWARE, Fault::ReplyLength(64));
    let err = session.command(Command::GET_FIRMWARE).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Protocol {
            expected: IN_FRAME_SIZE,
            actual: 64
        }
    );
    assert_eq!(err.kind(), ErrorKind::Protocol);

    mock.inject(Command::GET_FIRMWARE, Fault::ReplyLength(IN_FRAME_SIZE + 16));
    let err = session.command(Command::GET_FIRMWARE).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Protocol {
            expected: IN_FRAME_SIZE,
            actual: IN_FRAME_SIZE + 16
        }
    );
}

#[tokio::test]
async fn wrong_reply_length_wins_over_status_byte() {
    let (mock, session) = setup();

    for status in [0x01, 0x11, 0x12] {
        mock.inject(Command::HARDWARE_MODE, Fault::Reply { status, len: 32 });
        let err = session.command(Command::HARDWARE_MODE).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Protocol {
                expected: IN_FRAME_SIZE,
                actual: 32
            },
            "status 0x{status:02x}"
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    // Full-length reply with the same status is a device error
    mock.inject(
        Command::HARDWARE_MODE,
        Fault::Reply {
            status: 0x11,
            len: IN_FRAME_SIZE,
        },
    );
    let err = session.command(Command::HARDWARE_MODE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let (mock, session) = setup();
    let cases = [
        (0x01, ErrorKind::Unsupported),
        (0x10, ErrorKind::InvalidArgument),
        (0x11, ErrorKind::NoData),
        (0x12, ErrorKind::NoData),
        (0x42, ErrorKind::Io),
    ];

    for (code, kind) in cases {
        mock.inject(Command::HARDWARE_MODE, Fault::Status(code));
        let err = session.command(Command::HARDWARE_MODE).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status 0x{code:02x}");
    }

    mock.inject(Command::HARDWARE_MODE, Fault::Status(0x42));
    let err = session.command(Command::HARDWARE_MODE).await.unwrap_err();
    assert_eq!(err, TransportError::DeviceStatus(0x42));
}

#[tokio::test]
async fn send_failure_is_propagated() {
    let (mock, session) = setup();
    mock.inject(Command::OPEN_ENDPOINT, Fault::SendError(TransportError::Disconnected));

    let err = session.read_endpoint(Endpoint::FanState).await.unwrap_err();
    assert_eq!(err, TransportError::Disconnected);
    assert_eq!(err.kind(), ErrorKind::Transport);
    // close, then the failed open; nothing after
    assert_eq!(mock.frames().len(), 2);
}

#[tokio::test]
async fn read_transaction_sequence() {
    let (mock, session) = setup();
    mock.connect_fans(3, &[0, 2]);

    let data = session.read_endpoint(Endpoint::FanInventory).await.unwrap();
    assert_eq!(data.endpoint(), Endpoint::FanInventory);
    assert!(data.trailing_close_error().is_none());
    assert_eq!(data.bytes()[5], 3);
    assert_eq!(&data.bytes()[6..9], &[0x07, 0x00, 0x07]);

    assert_eq!(
        mock.commands(),
        vec![
            "CLOSE_ENDPOINT fan-inventory (0x1a)",
            "OPEN_ENDPOINT fan-inventory (0x1a)",
            "READ fan-inventory (0x1a)",
            "CLOSE_ENDPOINT fan-inventory (0x1a)",
        ]
    );
    assert_eq!(mock.open_endpoint(), None);
}

#[tokio::test]
async fn write_transaction_sequence() {
    let (mock, session) = setup();
    mock.connect_fans(6, &[1]);

    let data = session
        .write_endpoint(Endpoint::FanPwm, data_type::SET_SPEED, &[1, 1, 0, 50, 0])
        .await
        .unwrap();
    assert_eq!(data.endpoint(), Endpoint::FanPwm);
    assert_eq!(mock.duty(1), 50);

    let commands = mock.commands();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[0], "CLOSE_ENDPOINT fan-pwm (0x18)");
    assert_eq!(commands[1], "OPEN_ENDPOINT fan-pwm (0x18)");
    assert_eq!(commands[2], "WRITE");
    assert_eq!(commands[3], "CLOSE_ENDPOINT fan-pwm (0x18)");

    let write = &mock.frames()[2];
    assert_eq!(
        &write[..15],
        &[0x00, 0x08, 0x06, 0x01, 7, 0, 0, 0, 0x07, 0x00, 1, 1, 0, 50, 0]
    );
    assert!(write[15..].iter().all(|&b| b == 0));
}

#[tokio::test]
async fn failure_before_copy_aborts_without_trailing_close() {
    let (mock, session) = setup();
    mock.inject(Command::READ, Fault::Status(0x11));

    let err = session.read_endpoint(Endpoint::FanPwm).await.unwrap_err();
    assert_eq!(err, TransportError::NoData);
    assert_eq!(mock.frames().len(), 3);

    // Leftover open endpoint is closed by the next transaction's leading close
    mock.clear_frames();
    session.read_endpoint(Endpoint::FanPwm).await.unwrap();
    assert_eq!(mock.frames().len(), 4);
}

#[tokio::test]
async fn trailing_close_failure_keeps_payload() {
    let (mock, session) = setup();
    mock.set_rpm(0, 1234);
    mock.inject_after(Command::CLOSE_ENDPOINT, 1, Fault::Status(0x01));

    let data = session.read_endpoint(Endpoint::FanState).await.unwrap();
    assert_eq!(data.trailing_close_error(), Some(&TransportError::Unsupported));
    assert_eq!(i16::from_le_bytes([data.bytes()[6], data.bytes()[7]]), 1234);
}

#[tokio::test]
async fn oversized_write_sends_nothing() {
    let (mock, session) = setup();
    let payload = vec![0u8; 300];

    let err = session
        .write_endpoint(Endpoint::FanPwm, data_type::SET_SPEED, &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::PayloadTooLarge { len: 300, .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(mock.frames().is_empty());
}

#[tokio::test]
async fn duplicate_reply_is_dropped() {
    let (mock, session) = setup();
    mock.inject(Command::GET_FIRMWARE, Fault::DuplicateReply);

    session.command(Command::GET_FIRMWARE).await.unwrap();
    let reply = session.command(Command::SOFTWARE_MODE).await.unwrap();
    assert_eq!(&reply.as_bytes()[1..3], &[0x01, 0x03]);
    assert!(mock.software_mode());
}

#[tokio::test]
async fn unsolicited_report_is_dropped() {
    let (_mock, session) = setup();
    assert!(!session.capture().deliver(&[0u8; IN_FRAME_SIZE]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transactions_never_interleave() {
    let (mock, session) = setup();
    mock.connect_fans(6, &[0, 1, 2, 3, 4, 5]);
    let session = Arc::new(session);

    let endpoints = [
        Endpoint::FanState,
        Endpoint::FanPwm,
        Endpoint::FanInventory,
        Endpoint::TemperatureInventory,
    ];
    let mut handles = Vec::new();
    for i in 0..16 {
        let session = Arc::clone(&session);
        let ep = endpoints[i % endpoints.len()];
        handles.push(tokio::spawn(async move { session.read_endpoint(ep).await }));
    }
    for handle in handles {
        let data = handle.await.unwrap().unwrap();
        assert!(data.trailing_close_error().is_none());
    }

    assert_eq!(mock.interleaved(), 0);
    let commands = mock.commands();
    assert_eq!(commands.len(), 16 * 4);
    for group in commands.chunks(4) {
        let ep = group[0].trim_start_matches("CLOSE_ENDPOINT ");
        assert_eq!(group[1], format!("OPEN_ENDPOINT {ep}"));
        assert_eq!(group[2], format!("READ {ep}"));
        assert_eq!(group[3], format!("CLOSE_ENDPOINT {ep}"));
    }
}

#[tokio::test]
#[ignore] // requires hardware
async fn hardware_firmware_query() {
    let discovery = ccxt_transport::HidDiscovery::new();
    let device = discovery
        .find_first()
        .expect("No Commander Core XT found - plug in a supported device");
    let (session, _transport) =
        ccxt_transport::open_session(&device, SessionConfig::default(), None).unwrap();

    let reply = session.command(Command::GET_FIRMWARE).await.unwrap();
    println!(
        "firmware {}.{}.{}",
        reply.as_bytes()[3],
        reply.as_bytes()[4],
        u16::from_le_bytes([reply.as_bytes()[5], reply.as_bytes()[6]])
    );
}
