//! Integration tests for mcu-link.
//!
//! These tests run the command layers over a simulated MCU speaking the
//! wire protocol, plus property tests for the framing.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::SimulatedMcu;
use mcu_link::command::{ApplicationControl, McuInterfaces, OperationMode};
use mcu_link::config::LinkConfig;
use mcu_link::firmware::Version;
use mcu_link::protocol::{
    decode_header, encode_command, encode_response, validate_payload, CommandFrame, Operation,
    ResponseFrame, ResponseStatus, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use mcu_link::transport::{ByteChannel, CommandLink, LinkTransport};
use mcu_link::McuLinkError;
use proptest::prelude::*;
use std::sync::Arc;

fn control(mcu: &SimulatedMcu) -> ApplicationControl {
    ApplicationControl::new(Arc::new(LinkTransport::new(mcu.clone())))
}

#[test]
fn test_echo_over_simulated_mcu() {
    let mcu = SimulatedMcu::echo();
    let transport = LinkTransport::new(mcu.clone());

    let response = transport.send_command(0x24, b"payload").unwrap();
    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(&response.payload[..], b"payload");

    let state = mcu.state();
    assert_eq!(state.frames.len(), 1);
    assert_eq!(state.frames[0].operation, Operation::Start);
    assert_eq!(state.frames[0].command_id, 0x24);
}

#[test]
fn test_simulated_reply_is_a_response_frame() {
    let mut mcu = SimulatedMcu::new(|_, _| (ResponseStatus::CommandError, vec![0x0E, 0x0F]));
    mcu.write(&CommandFrame::start(0x12, &[1]).encode().unwrap())
        .unwrap();

    let frame = ResponseFrame::decode(&mcu.read(HEADER_SIZE + 2).unwrap()).unwrap();
    assert_eq!(frame.status(), ResponseStatus::CommandError);
    assert_eq!(frame.payload(), &[0x0E, 0x0F]);
}

#[test]
fn test_busy_and_pending_over_simulated_mcu() {
    let mcu = SimulatedMcu::new(|_, _| (ResponseStatus::Ok, b"0.2.1024-dev".to_vec()));
    mcu.state().busy_reads = 2;
    mcu.state().pending_polls = 2;

    let version = control(&mcu).get_firmware_version().unwrap();
    assert_eq!(version, Some("0.2.1024-dev".parse::<Version>().unwrap()));

    let state = mcu.state();
    let ops: Vec<Operation> = state.frames.iter().map(|f| f.operation).collect();
    assert_eq!(
        ops,
        vec![Operation::Start, Operation::GetResult, Operation::GetResult]
    );
    // Two busy reads and one real header per written frame.
    assert_eq!(state.header_reads, 9);
}

#[test]
fn test_string_list_command() {
    let mcu = SimulatedMcu::new(|id, _| {
        assert_eq!(id, 0x11);
        (ResponseStatus::Ok, b"\x00\x0dNotConfigured\x01\x07DcMotor".to_vec())
    });

    let types = control(&mcu).get_motor_port_types().unwrap();
    let expected: HashMap<String, u8> = [("NotConfigured".to_string(), 0), ("DcMotor".to_string(), 1)]
        .into_iter()
        .collect();
    assert_eq!(types, expected);
}

#[test]
fn test_unknown_command_is_typed() {
    let mcu = SimulatedMcu::new(|_, _| (ResponseStatus::UnknownCommand, Vec::new()));
    assert!(matches!(
        control(&mcu).ring_led_get_led_amount(),
        Err(McuLinkError::UnknownCommand(0x32))
    ));
}

#[test]
fn test_command_error_carries_payload() {
    let mcu = SimulatedMcu::new(|_, _| (ResponseStatus::CommandError, vec![0xE1]));
    match control(&mcu).set_motor_port_type(9, 1) {
        Err(McuLinkError::CommandFailed {
            command_id,
            status,
            payload,
        }) => {
            assert_eq!(command_id, 0x12);
            assert_eq!(status, ResponseStatus::CommandError);
            assert_eq!(&payload[..], &[0xE1]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_ring_led_user_frame_is_rgb565() {
    let mcu = SimulatedMcu::new(|_, payload| {
        assert_eq!(payload, &[0x00, 0xF8, 0xE0, 0x07, 0x1F, 0x00]);
        (ResponseStatus::Ok, Vec::new())
    });
    control(&mcu)
        .ring_led_set_user_frame(&[0xFF0000, 0x00FF00, 0x0000FF])
        .unwrap();
}

#[test]
fn test_interfaces_from_channels() {
    let app = SimulatedMcu::new(|_, _| (ResponseStatus::Ok, vec![0xAA]));
    let boot = SimulatedMcu::new(|_, _| (ResponseStatus::Ok, vec![0xBB]));
    let config = LinkConfig::default().with_response_timeout(Duration::from_millis(200));

    let mcu = McuInterfaces::from_channels(app.clone(), boot.clone(), &config);
    assert_eq!(
        mcu.application.read_operation_mode().unwrap(),
        OperationMode::Application
    );
    assert_eq!(
        mcu.bootloader.read_operation_mode().unwrap(),
        OperationMode::Bootloader
    );
    assert_eq!(app.state().frames.len(), 1);
    assert_eq!(boot.state().frames.len(), 1);
}

#[test]
fn test_transport_is_shared_between_threads() {
    let mcu = SimulatedMcu::echo();
    let transport = Arc::new(LinkTransport::new(mcu.clone()));

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let transport = transport.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let response = transport.send_command(0x00, &[i]).unwrap();
                    assert_eq!(&response.payload[..], &[i]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(mcu.state().frames.len(), 40);
}

proptest! {
    #[test]
    fn prop_response_roundtrip(status in 0u8..=11, payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE)) {
        let status = ResponseStatus::try_from(status).unwrap();
        let bytes = encode_response(status, &payload).unwrap();

        let header = decode_header(&bytes[..HEADER_SIZE]).unwrap();
        prop_assert_eq!(header.status, status);
        prop_assert_eq!(header.payload_length as usize, payload.len());
        prop_assert!(validate_payload(&header, &bytes[HEADER_SIZE..]));
    }

    #[test]
    fn prop_command_roundtrip(command_id in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE)) {
        let bytes = encode_command(Operation::Start, command_id, &payload).unwrap();
        let frame = CommandFrame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.operation, Operation::Start);
        prop_assert_eq!(frame.command_id, command_id);
        prop_assert_eq!(frame.payload(), &payload[..]);
    }

    #[test]
    fn prop_oversized_payload_rejected(extra in 1usize..64) {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + extra];
        prop_assert!(
            matches!(
                encode_command(Operation::Start, 0, &payload),
                Err(McuLinkError::PayloadTooLong(_))
            ),
            "command payload accepted"
        );
        prop_assert!(
            matches!(
                encode_response(ResponseStatus::Ok, &payload),
                Err(McuLinkError::PayloadTooLong(_))
            ),
            "response payload accepted"
        );
    }

    #[test]
    fn prop_header_bit_flip_rejected(
        status in 0u8..=11,
        payload in proptest::collection::vec(any::<u8>(), 0..32),
        bit in 0usize..(HEADER_SIZE * 8),
    ) {
        let status = ResponseStatus::try_from(status).unwrap();
        let mut header = encode_response(status, &payload).unwrap()[..HEADER_SIZE].to_vec();
        header[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(decode_header(&header).is_err());
    }
}
