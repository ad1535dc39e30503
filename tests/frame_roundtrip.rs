//! Wire framing: encode/decode roundtrips, checksum, resync behavior.

mod common;

use common::*;

#[test]
fn relay_status_frame_roundtrip() {
    let status = RelayStatus {
        channel: 3,
        override_state: OverrideState::Normal,
        status: RELAY_ON,
        led_status: 0,
        delay_time: 0,
    };
    let msg = Message::RelayStatus(status.clone());
    let raw = msg.to_raw(0x12);
    let bytes = raw.to_bytes();

    // START, low priority, address, 8 data bytes, command first.
    assert_eq!(&bytes[..4], &[0x0F, 0xFB, 0x12, 0x08]);
    assert_eq!(bytes[4], 0xFB);
    assert_eq!(bytes[5], 0x04); // channel 3 as a bitmap
    assert_eq!(bytes[bytes.len() - 1], 0x04);
    let payload_len = bytes.len() - 2;
    assert_eq!(checksum(&bytes[..payload_len]), bytes[payload_len]);

    // Decoding the stream yields the same raw message...
    let mut buf = BytesMut::from(&bytes[..]);
    let decoded = next_frame(&mut buf).expect("frame should decode");
    assert_eq!(decoded, raw);
    assert!(buf.is_empty());

    // ...and the registry turns it back into the same typed message.
    let kind = COMMAND_REGISTRY
        .get(0xFB, 0x11)
        .expect("relay status is a default command");
    assert_eq!(kind.decode(&decoded).unwrap(), msg);
}

#[test]
fn every_status_message_survives_a_roundtrip() {
    let messages = vec![
        Message::PushButtonStatus(PushButtonStatus {
            closed: vec![1, 4],
            opened: vec![2],
            closed_long: vec![1],
        }),
        Message::ModuleStatus2(ModuleStatus2 {
            closed: vec![2],
            enabled: vec![1, 2, 3, 4],
            normal: vec![1, 2],
            locked: vec![],
            program_enabled: vec![1],
            selected_program: 2,
        }),
        Message::CounterStatus(CounterStatus {
            channel: 2,
            pulses: 100,
            counter: 123_456,
            delay: 1500,
        }),
        Message::SensorTemperature(SensorTemperature {
            cur: 21.0,
            min: -4.5,
            max: 35.5,
        }),
        Message::MemoryData(MemoryData {
            high_address: 0x00,
            low_address: 0xF3,
            data: b'p',
        }),
        Message::SetRealtimeClock(SetRealtimeClock {
            weekday: 4,
            hour: 13,
            minute: 37,
        }),
        Message::DimValueStatus(DimValueStatus {
            channel: 65,
            dim_values: vec![200, 12],
        }),
    ];

    for msg in messages {
        let raw = msg.to_raw(0x42);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&raw.to_bytes());
        let decoded = next_frame(&mut buf).expect("frame should decode");
        assert_eq!(decoded, raw, "raw mismatch for {msg:?}");
        assert_eq!(decoded.command(), Some(raw.data[0]));
    }
}

#[test]
fn decoder_skips_garbage_and_recovers_after_corruption() {
    let first = Message::SwitchRelayOn(SwitchRelayOn::new(vec![1])).to_raw(0x05);
    let second = Message::SwitchRelayOff(SwitchRelayOff::new(vec![1])).to_raw(0x05);

    let mut stream = BytesMut::new();
    stream.extend_from_slice(&[0x00, 0xA5, 0x5A]); // line noise
    stream.extend_from_slice(&first.to_bytes());
    let mut corrupted = second.to_bytes().to_vec();
    corrupted[6] ^= 0x80; // break the checksum
    stream.extend_from_slice(&corrupted);
    stream.extend_from_slice(&second.to_bytes());

    assert_eq!(next_frame(&mut stream), Some(first));
    assert_eq!(next_frame(&mut stream), Some(second));
    assert_eq!(next_frame(&mut stream), None);
}

#[test]
fn module_type_request_is_an_rtr_frame() {
    let raw = Message::ModuleTypeRequest(ModuleTypeRequest).to_raw(0x07);
    assert!(raw.rtr);
    assert!(raw.data.is_empty());
    let bytes = raw.to_bytes();
    assert_eq!(&bytes[..4], &[0x0F, 0xFB, 0x07, 0x40]);
}

#[test]
fn truncated_frame_waits_for_the_rest() {
    let raw = Message::SetDate(SetDate {
        day: 28,
        month: 2,
        year: 2024,
    })
    .to_raw(0x00);
    let bytes = raw.to_bytes();
    let mut buf = BytesMut::from(&bytes[..bytes.len() - 3]);
    assert_eq!(next_frame(&mut buf), None);
    buf.extend_from_slice(&bytes[bytes.len() - 3..]);
    assert_eq!(next_frame(&mut buf), Some(raw));
}
