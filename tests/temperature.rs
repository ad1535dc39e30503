//! Temperature precision reconciliation between the fine sensor stream and
//! the coarse thermostat status.

mod common;

use common::*;

fn ramp_profile() -> Vec<f64> {
    let up: Vec<f64> = (0..=16).map(|n| 20.0 + n as f64 / 16.0).collect();
    let mut profile = up.clone();
    profile.extend(up.into_iter().rev());
    profile
}

/// The unrounded stored temperature.
fn stored_temp(module: &Module) -> f64 {
    match module.get_channel(33).unwrap().state() {
        ChannelState::Temperature { cur, .. } => *cur,
        other => panic!("unexpected channel state {other:?}"),
    }
}

#[test]
fn same_precision_updates_stay_within_one_step() {
    for precision in [0.5, 1.0 / 16.0] {
        let (mut module, _queue) = common::test_module(0x01, 0x28);
        for temp in ramp_profile() {
            let truncated = (temp / precision).floor() * precision;
            module
                .get_channel_mut(33)
                .unwrap()
                .maybe_update_temperature(truncated, precision);
            let stored = stored_temp(&module);
            assert!(
                stored <= temp && temp < stored + precision,
                "stored {stored} outside [{temp}, {temp} + {precision})"
            );
        }
    }
}

#[test]
fn alternating_precision_never_loses_more_than_one_step() {
    let (mut module, _queue) = common::test_module(0x01, 0x28);
    for temp in ramp_profile() {
        for precision in [0.5, 1.0 / 64.0] {
            let truncated = (temp / precision).floor() * precision;
            module
                .get_channel_mut(33)
                .unwrap()
                .maybe_update_temperature(truncated, precision);
            let stored = stored_temp(&module);
            let stored_truncated = (stored / precision).floor() * precision;
            assert!(
                stored_truncated <= temp && temp < stored_truncated + precision,
                "stored {stored} (truncated {stored_truncated}) drifted from {temp} at precision {precision}"
            );
        }
    }
}

/// A coarse reading one LSb below the stored fine value keeps the fine
/// bits: 21.0000 at 1/16 precision, then 21.0 and 20.5 at 1/2, ends at
/// 20.9375 rather than 20.5.
#[test]
fn coarse_update_preserves_fine_bits() {
    let (mut module, _queue) = common::test_module(0x01, 0x28);
    let fine = 1.0 / 16.0;

    module
        .get_channel_mut(33)
        .unwrap()
        .maybe_update_temperature(21.0, fine);
    assert_eq!(stored_temp(&module), 21.0);

    module
        .get_channel_mut(33)
        .unwrap()
        .maybe_update_temperature(21.0, 0.5);
    assert_eq!(stored_temp(&module), 21.0);

    module
        .get_channel_mut(33)
        .unwrap()
        .maybe_update_temperature(20.5, 0.5);
    assert_eq!(stored_temp(&module), 20.9375);
}

/// Sub-zero readings use an unsigned word with a -127 °C offset, not
/// two's complement: 0xF400 is -5.0 °C, one degree above what a signed
/// decode would give.
#[test]
fn sub_zero_sensor_readings_decode_with_the_offset() {
    let wire = vec![0xE6, 0xF4, 0x00, 0xF3, 0x00, 0x2A, 0x00];
    let raw = RawMessage::new(PRIORITY_LOW, 0x30, false, wire.clone());
    let kind = COMMAND_REGISTRY.get(0xE6, 0x31).expect("default command");
    let Message::SensorTemperature(temp) = kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(temp.cur, -5.0);
    assert_eq!(temp.min, -5.5);
    assert_eq!(temp.max, 21.0);

    // The encoder reproduces the reference bytes.
    assert_eq!(temp.encode_data(), wire);
}

/// A freezing outdoor report lands on the weather station's temperature
/// channel unchanged.
#[test]
fn sub_zero_reading_reaches_the_temperature_channel() {
    let (mut module, _queue) = common::test_module(0x30, 0x31); // VMBMETEO

    let raw = RawMessage::new(
        PRIORITY_LOW,
        0x30,
        false,
        vec![0xE6, 0xF4, 0x00, 0xF3, 0x00, 0x2A, 0x00],
    );
    let kind = COMMAND_REGISTRY.get(0xE6, 0x31).unwrap();
    module.on_message(0x30, &kind.decode(&raw).unwrap());

    let cur = match module.get_channel(10).unwrap().state() {
        ChannelState::Temperature { cur, .. } => *cur,
        other => panic!("unexpected channel state {other:?}"),
    };
    assert_eq!(cur, -5.0);
}

/// The two real streams: SensorTemperature carries 1/64 °C steps, the
/// thermostat status half-degree steps. Feeding both through the module
/// dispatcher must not bounce the stored value around.
#[test]
fn sensor_and_thermostat_streams_reconcile() {
    let (mut module, _queue) = common::test_module(0x01, 0x28);

    module.on_message(
        0x01,
        &Message::SensorTemperature(SensorTemperature {
            cur: 21.25,
            min: 19.0,
            max: 24.0,
        }),
    );
    assert_eq!(stored_temp(&module), 21.25);

    // Thermostat reports the same temperature truncated to 21.0; the fine
    // reading must survive.
    module.on_message(
        0x01,
        &Message::TempSensorStatus(TempSensorStatus {
            local_control: false,
            mode: ClimateMode::Run,
            auto_send: false,
            preset: ClimatePreset::Day,
            cool_mode: false,
            heater: false,
            boost: false,
            pump: false,
            cooler: false,
            alarm1: false,
            alarm2: false,
            alarm3: false,
            alarm4: false,
            current_temp: 21.0,
            target_temp: 21.5,
            sleep_timer: 0,
        }),
    );
    assert_eq!(stored_temp(&module), 21.25);
    assert_eq!(module.get_channel(33).unwrap().get_climate_target(), 21.5);
}
