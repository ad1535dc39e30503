//! Channel state mutations driven by incoming status reports.

mod common;

use common::*;

#[test]
fn relay_status_sets_the_switch_state() {
    let (mut module, mut queue) = common::test_module(0x12, 0x11); // VMB4RYNO

    module.on_message(
        0x12,
        &Message::RelayStatus(RelayStatus {
            channel: 3,
            override_state: OverrideState::Normal,
            status: RELAY_ON,
            led_status: 0,
            delay_time: 0,
        }),
    );
    assert!(module.get_channel(3).unwrap().is_on());
    assert!(!module.get_channel(1).unwrap().is_on());

    module.on_message(
        0x12,
        &Message::RelayStatus(RelayStatus {
            channel: 3,
            override_state: OverrideState::Disabled,
            status: 0,
            led_status: 0,
            delay_time: 0,
        }),
    );
    let channel = module.get_channel(3).unwrap();
    assert!(!channel.is_on());
    assert!(matches!(
        channel.state(),
        ChannelState::Relay { disabled: true, .. }
    ));

    // Operations translate into switch commands on the queue.
    module.get_channel(3).unwrap().turn_on();
    module.get_channel(3).unwrap().turn_off();
    let frames = common::drain(&mut queue);
    assert_eq!(frames[0].data, vec![0x02, 0x04]);
    assert_eq!(frames[1].data, vec![0x01, 0x04]);
}

#[test]
fn push_button_edges_and_long_press() {
    let (mut module, _queue) = common::test_module(0x01, 0x16); // VMB8PBU

    module.on_message(
        0x01,
        &Message::PushButtonStatus(PushButtonStatus {
            closed: vec![2],
            opened: vec![],
            closed_long: vec![],
        }),
    );
    assert!(module.get_channel(2).unwrap().is_closed());

    module.on_message(
        0x01,
        &Message::PushButtonStatus(PushButtonStatus {
            closed: vec![],
            opened: vec![],
            closed_long: vec![2],
        }),
    );
    assert!(matches!(
        module.get_channel(2).unwrap().state(),
        ChannelState::Button { long: true, .. }
    ));

    module.on_message(
        0x01,
        &Message::PushButtonStatus(PushButtonStatus {
            closed: vec![],
            opened: vec![2],
            closed_long: vec![],
        }),
    );
    let channel = module.get_channel(2).unwrap();
    assert!(!channel.is_closed());
    assert!(matches!(
        channel.state(),
        ChannelState::Button { long: false, .. }
    ));
}

#[test]
fn blind_status_with_and_without_position() {
    let (mut module, mut queue) = common::test_module(0x08, 0x1D); // VMB2BLE

    module.on_message(
        0x08,
        &Message::BlindStatusNg(BlindStatusNg {
            channel: 2,
            timeout: 30,
            state: BlindState::Down,
            led_status: 0,
            position: 75,
        }),
    );
    let channel = module.get_channel(2).unwrap();
    assert_eq!(channel.get_blind_state(), Some(BlindState::Down));
    assert_eq!(channel.get_position(), Some(75));

    channel.open();
    channel.stop();
    channel.set_position(10);
    let frames = common::drain(&mut queue);
    assert_eq!(frames[0].data[..2], [0x05, 0x02]);
    assert_eq!(frames[1].data, vec![0x04, 0x02]);
    assert_eq!(frames[2].data, vec![0x1C, 0x02, 10]);
    // Cover commands leave at high priority.
    assert!(frames.iter().all(|f| f.priority == PRIORITY_HIGH));
}

#[test]
fn old_blind_generation_uses_two_bit_channel_masks() {
    let (mut module, mut queue) = common::test_module(0x08, 0x09); // VMB2BL

    // Channel 2 moving up, encoded in the two-bit fields.
    let raw = RawMessage::new(PRIORITY_LOW, 0x08, false, vec![0xEC, 0x04, 30, 0x04, 0, 0, 0, 0]);
    let kind = COMMAND_REGISTRY.get(0xEC, 0x09).unwrap();
    assert_eq!(kind, MessageKind::BlindStatus);
    let msg = kind.decode(&raw).unwrap();
    module.on_message(0x08, &msg);
    assert_eq!(
        module.get_channel(2).unwrap().get_blind_state(),
        Some(BlindState::Up)
    );

    module.get_channel(1).unwrap().close();
    let frames = common::drain(&mut queue);
    assert_eq!(frames[0].data[..2], [0x06, 0x03]);
}

#[test]
fn counter_status_and_memory_settings_give_a_rate() {
    let (mut module, _queue) = common::test_module(0x05, 0x22); // VMB7IN

    // Memory byte: unit kWh for channel 1.
    module.on_message(
        0x05,
        &Message::MemoryData(MemoryData {
            high_address: 0x03,
            low_address: 0xF0,
            data: 0x02,
        }),
    );
    // 2000 ms per pulse at 500 pulses/kWh -> 3.6 kW.
    module.on_message(
        0x05,
        &Message::CounterStatus(CounterStatus {
            channel: 1,
            pulses: 500,
            counter: 1000,
            delay: 2000,
        }),
    );
    let channel = module.get_channel(1).unwrap();
    assert_eq!(channel.get_counter_unit(), Some(CounterUnit::KilowattHours));
    assert_eq!(channel.get_counter_rate(), 3600.0);
    assert_eq!(channel.get_counter_state(), 2.0);

    // The 0xFFFF delay sentinel means "no measurable flow".
    module.on_message(
        0x05,
        &Message::CounterStatus(CounterStatus {
            channel: 1,
            pulses: 500,
            counter: 1000,
            delay: 0xFFFF,
        }),
    );
    assert_eq!(module.get_channel(1).unwrap().get_counter_rate(), 0.0);
}

#[test]
fn counter_pulse_memory_uses_the_multiplier_bits() {
    let (mut module, _queue) = common::test_module(0x05, 0x22);

    // bits 0-5 = 8 (x100 = 800), bits 6-7 = 01 (x2.5) -> 2000 pulses/unit.
    module.on_message(
        0x05,
        &Message::MemoryData(MemoryData {
            high_address: 0x03,
            low_address: 0xE8,
            data: 0x48,
        }),
    );
    assert_eq!(module.get_channel(1).unwrap().get_pulses_per_unit(), 2000.0);
}

#[test]
fn led_commands_track_button_led_state() {
    let (mut module, _queue) = common::test_module(0x01, 0x16);

    module.on_message(0x01, &Message::SetLed(SetLed::new(vec![1, 3])));
    assert_eq!(module.get_channel(1).unwrap().get_led_state(), Some(LedState::On));
    assert_eq!(module.get_channel(3).unwrap().get_led_state(), Some(LedState::On));

    module.on_message(0x01, &Message::SlowBlinkingLed(SlowBlinkingLed::new(vec![3])));
    assert_eq!(module.get_channel(3).unwrap().get_led_state(), Some(LedState::Slow));

    module.on_message(
        0x01,
        &Message::UpdateLedStatus(UpdateLedStatus {
            led_on: vec![2],
            led_slow_blinking: vec![],
            led_fast_blinking: vec![],
        }),
    );
    assert_eq!(module.get_channel(2).unwrap().get_led_state(), Some(LedState::On));
    // Channels absent from every bitmap fall back to off.
    assert_eq!(module.get_channel(1).unwrap().get_led_state(), Some(LedState::Off));
}

#[test]
fn meteo_and_analog_sensors_land_on_their_channels() {
    let (mut meteo, _q1) = common::test_module(0x30, 0x31); // VMBMETEO
    meteo.on_message(
        0x30,
        &Message::MeteoRaw(MeteoRaw {
            rain: 1.5,
            light: 850.0,
            wind: 4.2,
        }),
    );
    assert_eq!(meteo.get_channel(11).unwrap().get_state(), 1.5);
    assert_eq!(meteo.get_channel(12).unwrap().get_state(), 850.0);
    assert_eq!(meteo.get_channel(13).unwrap().get_state(), 4.2);

    let (mut analog, _q2) = common::test_module(0x31, 0x32); // VMB4AN
    analog.on_message(
        0x31,
        &Message::SensorRaw(SensorRaw {
            sensor: 5,
            mode: AnalogMode::Voltage,
            value: 1250.0,
        }),
    );
    let channel = analog.get_channel(5).unwrap();
    assert_eq!(channel.get_state(), 1250.0);
    assert_eq!(channel.get_unit().as_deref(), Some("mV"));
}

/// Frames arriving on a sub-address mutate the banked channels of the
/// primary module.
#[test]
fn sub_address_frames_shift_into_the_right_bank() {
    let (mut module, _queue) = common::test_module(0x01, 0x28); // VMBGPOD

    module.on_message(
        0x01,
        &Message::ModuleSubType(ModuleSubType {
            module_type: 0x28,
            serial: 0x1234,
            bank: 0,
            sub_addresses: [0x41, 0x42, 0x43, 0xFF],
        }),
    );
    assert_eq!(module.get_addresses(), vec![0x01, 0x41, 0x42, 0x43]);
    assert_eq!(module.serial, 0x1234);

    // Button 2 of the first sub-address bank is channel 10.
    module.on_message(
        0x41,
        &Message::PushButtonStatus(PushButtonStatus {
            closed: vec![2],
            opened: vec![],
            closed_long: vec![],
        }),
    );
    assert!(module.get_channel(10).unwrap().is_closed());
    assert!(!module.get_channel(2).unwrap().is_closed());
}
