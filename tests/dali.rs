//! Runtime channel discovery on the VMBDALI gateway.

mod common;

use common::*;
use std::sync::Arc;
use tokio::sync::Mutex;

async fn scanned_dali_module() -> (Arc<Mutex<Module>>, tokio::sync::mpsc::UnboundedReceiver<RawMessage>) {
    let (module, queue) = common::test_module(0x12, 0x45);
    let module = Arc::new(Mutex::new(module));
    load_module(module.clone(), false).await;
    (module, queue)
}

#[tokio::test(start_paused = true)]
async fn scan_creates_placeholders_and_requests_settings() {
    let (module, mut queue) = scanned_dali_module().await;

    assert_eq!(module.lock().await.get_channels().len(), 64);
    let frames = common::drain(&mut queue);
    let settings_requests = frames
        .iter()
        .filter(|f| f.command() == Some(0xE7))
        .count();
    assert_eq!(settings_requests, 64);
    // Names are only requested after the settings scan.
    assert!(frames.iter().any(|f| f.command() == Some(0xEF)));
}

#[tokio::test(start_paused = true)]
async fn device_type_replies_shape_the_channel_list() {
    let (module, _queue) = scanned_dali_module().await;
    let mut m = module.lock().await;

    m.on_message(
        0x12,
        &Message::DaliDeviceSettings(DaliDeviceSettings {
            channel: 1,
            value: DaliSettingValue::DeviceType(DaliDeviceType::LedModule),
        }),
    );
    m.on_message(
        0x12,
        &Message::DaliDeviceSettings(DaliDeviceSettings {
            channel: 2,
            value: DaliSettingValue::DeviceType(DaliDeviceType::NoDevicePresent),
        }),
    );

    assert!(matches!(
        m.get_channel(1).unwrap().state(),
        ChannelState::Dimmer { .. }
    ));
    assert!(m.get_channel(2).is_none());
}

#[tokio::test(start_paused = true)]
async fn group_membership_routes_group_dim_updates() {
    let (module, _queue) = scanned_dali_module().await;
    let mut m = module.lock().await;

    m.on_message(
        0x12,
        &Message::DaliDeviceSettings(DaliDeviceSettings {
            channel: 1,
            value: DaliSettingValue::DeviceType(DaliDeviceType::LedModule),
        }),
    );
    m.on_message(
        0x12,
        &Message::DaliDeviceSettings(DaliDeviceSettings {
            channel: 1,
            value: DaliSettingValue::MemberOfGroup(vec![0]),
        }),
    );
    assert_eq!(m.dali_group_members(0), &[1]);

    // Group 0 lives at index 65; its dim value lands on every member.
    m.on_message(
        0x12,
        &Message::DimValueStatus(DimValueStatus {
            channel: 65,
            dim_values: vec![200],
        }),
    );
    assert_eq!(m.get_channel(1).unwrap().get_dimmer_state(), 200);
}

#[tokio::test(start_paused = true)]
async fn broadcast_dim_updates_reach_every_channel() {
    let (module, _queue) = scanned_dali_module().await;
    let mut m = module.lock().await;

    m.on_message(
        0x12,
        &Message::DimValueStatus(DimValueStatus {
            channel: 81,
            dim_values: vec![42],
        }),
    );
    for num in [1u8, 17, 64] {
        assert_eq!(m.get_channel(num).unwrap().get_dimmer_state(), 42);
    }
}

#[tokio::test(start_paused = true)]
async fn individual_dim_values_apply_to_consecutive_channels() {
    let (module, _queue) = scanned_dali_module().await;
    let mut m = module.lock().await;

    m.on_message(
        0x12,
        &Message::DimValueStatus(DimValueStatus {
            channel: 3,
            dim_values: vec![10, 20, 30],
        }),
    );
    assert_eq!(m.get_channel(3).unwrap().get_dimmer_state(), 10);
    assert_eq!(m.get_channel(4).unwrap().get_dimmer_state(), 20);
    assert_eq!(m.get_channel(5).unwrap().get_dimmer_state(), 30);
}

#[test]
fn dali_settings_wire_decoding() {
    // Channel 1 reports DeviceType = LedModule (setting 25, value 6).
    let raw = RawMessage::new(PRIORITY_LOW, 0x12, false, vec![0xE8, 0x01, 25, 6]);
    let kind = COMMAND_REGISTRY.get(0xE8, 0x45).expect("VMBDALI override");
    let Message::DaliDeviceSettings(settings) = kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(settings.channel, 1);
    assert_eq!(
        settings.value,
        DaliSettingValue::DeviceType(DaliDeviceType::LedModule)
    );

    // Group membership arrives as a 16-bit little-endian mask.
    let raw = RawMessage::new(PRIORITY_LOW, 0x12, false, vec![0xE8, 0x01, 21, 0x05, 0x00]);
    let Message::DaliDeviceSettings(settings) = kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(settings.value, DaliSettingValue::MemberOfGroup(vec![0, 2]));
}
