//! Thermostat mode handling on the glass panels (VMBGPOD).

mod common;

use common::*;

fn temp_status(mode: ClimateMode, sleep_timer: u16) -> Message {
    Message::TempSensorStatus(TempSensorStatus {
        local_control: false,
        mode,
        auto_send: false,
        preset: ClimatePreset::Safe,
        cool_mode: false,
        heater: false,
        boost: false,
        pump: false,
        cooler: false,
        alarm1: false,
        alarm2: false,
        alarm3: false,
        alarm4: false,
        current_temp: 0.0,
        target_temp: 0.0,
        sleep_timer,
    })
}

/// Feed a status, read the mode back, send the matching mode command and
/// check the sleep-timer encoding on the wire.
#[test]
fn climate_mode_roundtrip() {
    let cases = [
        (ClimateMode::Manual, 0xFFFFu16, [0xFFu8, 0xFF]),
        (ClimateMode::Run, 0x0000, [0x00, 0x00]),
        (ClimateMode::Sleep, 500, [0x01, 0xF4]),
    ];

    for (mode, sleep, expected) in cases {
        let (mut module, mut queue) = common::test_module(0x01, 0x28);

        module.on_message(0x01, &temp_status(mode, sleep));
        let channel = module.get_channel(33).unwrap();
        assert_eq!(channel.get_climate_mode(), Some(mode));
        assert_eq!(channel.get_sleep_timer(), sleep);

        channel.set_climate_mode(mode, sleep);
        let frames = common::drain(&mut queue);
        let frame = frames.last().expect("a mode command should go out");
        assert_eq!(frame.address, 0x01);
        assert_eq!(frame.data[1], expected[0]);
        assert_eq!(frame.data[2], expected[1]);
    }
}

#[test]
fn thermostat_status_drives_output_channels() {
    let (mut module, _queue) = common::test_module(0x01, 0x28);

    let mut status = match temp_status(ClimateMode::Run, 0) {
        Message::TempSensorStatus(status) => status,
        _ => unreachable!(),
    };
    status.heater = true;
    status.pump = true;
    status.alarm2 = true;
    module.on_message(0x01, &Message::TempSensorStatus(status.clone()));

    let active: Vec<u8> = module
        .get_channels()
        .iter()
        .filter(|(_, chan)| matches!(chan.state(), ChannelState::ThermostatChannel { active: true }))
        .map(|(num, _)| *num)
        .collect();
    // Heater = 34, Pump = 36, Alarm 2 = 39 in the VMBGPOD layout.
    assert_eq!(active, vec![34, 36, 39]);

    status.heater = false;
    module.on_message(0x01, &Message::TempSensorStatus(status));
    assert!(matches!(
        module.get_channel(34).unwrap().state(),
        ChannelState::ThermostatChannel { active: false }
    ));
}

#[test]
fn temp_sensor_status_decodes_all_fields() {
    // DB1: manual (0x02) + day preset (0x20), DB3: heater + cooler,
    // DB5/6: 21.5 °C current, 23.0 °C target, DB7-8: sleep timer 500.
    let raw = RawMessage::new(
        PRIORITY_LOW,
        0x01,
        false,
        vec![0xEA, 0x22, 0x00, 0x09, 43, 46, 0x01, 0xF4],
    );
    let kind = COMMAND_REGISTRY.get(0xEA, 0x28).expect("default command");
    let Message::TempSensorStatus(status) = kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(status.mode, ClimateMode::Manual);
    assert_eq!(status.preset, ClimatePreset::Day);
    assert!(status.heater);
    assert!(status.cooler);
    assert!(!status.boost);
    assert_eq!(status.current_temp, 21.5);
    assert_eq!(status.target_temp, 23.0);
    assert_eq!(status.sleep_timer, 500);
}
