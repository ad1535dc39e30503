//! Name assembly: memory-dump module names and three-part channel names.

mod common;

use common::*;

/// Write "Temp. controller" into the VMB1TC name memory window byte by
/// byte; the assembled module name appears once the window is full.
#[test]
fn vmb1tc_module_name_from_memory_dump() {
    let (mut module, _queue) = common::test_module(0x01, 0x0E);
    assert_eq!(module.get_name(), "VMB1TC");

    let name = b"Temp. controller";
    assert_eq!(name.len(), 16);
    for (i, byte) in name.iter().enumerate() {
        module.on_message(
            0x01,
            &Message::MemoryData(MemoryData {
                high_address: 0x00,
                low_address: 0xF0 + i as u8,
                data: *byte,
            }),
        );
    }
    assert_eq!(module.get_name(), "Temp. controller");
    assert!(module.is_loaded());
}

/// A shorter name ends with 0xFF padding, which doubles as the save marker.
#[test]
fn padded_module_name_commits_on_the_pad_byte() {
    let (mut module, _queue) = common::test_module(0x01, 0x0E);
    for (i, byte) in b"Bathroom".iter().enumerate() {
        module.on_message(
            0x01,
            &Message::MemoryData(MemoryData {
                high_address: 0x00,
                low_address: 0xF0 + i as u8,
                data: *byte,
            }),
        );
    }
    module.on_message(
        0x01,
        &Message::MemoryData(MemoryData {
            high_address: 0x00,
            low_address: 0xF8,
            data: 0xFF,
        }),
    );
    assert_eq!(module.get_name(), "Bathroom");
}

/// Channel names arrive in three parts and complete when part 3 lands,
/// filtered to printable characters.
#[test]
fn channel_name_from_three_parts() {
    let (mut module, _queue) = common::test_module(0x01, 0x11); // VMB4RYNO
    assert!(!module.get_channel(1).unwrap().is_loaded());

    let parts: [(u8, &[u8]); 3] = [
        (1, b"Kitche"),
        (2, b"n ligh"),
        (3, &[b't', 0xFF, 0xFF, 0xFF]),
    ];
    for (part, text) in parts {
        module.on_message(
            0x01,
            &Message::ChannelNamePart(ChannelNamePart {
                part,
                channel: 1,
                name: text.to_vec(),
                indexing: ChannelIndexing::Bit,
            }),
        );
    }
    let channel = module.get_channel(1).unwrap();
    assert_eq!(channel.get_name(), "Kitchen light");
    assert!(channel.is_loaded());
}

/// Name parts decode per module family: bitmap for relays, raw byte for
/// the glass panels.
#[test]
fn name_part_channel_indexing_follows_the_module_type() {
    let relay_kind = COMMAND_REGISTRY.get(0xF0, 0x11).unwrap();
    assert_eq!(relay_kind, MessageKind::ChannelNamePart1);
    let raw = RawMessage::new(
        PRIORITY_LOW,
        0x01,
        false,
        vec![0xF0, 0x04, b'R', b'e', b'l', b'a', b'y', b' '],
    );
    let Message::ChannelNamePart(part) = relay_kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(part.channel, 3); // bit 2 set

    let panel_kind = COMMAND_REGISTRY.get(0xF0, 0x20).unwrap();
    assert_eq!(panel_kind, MessageKind::ChannelNamePart1Indexed);
    let Message::ChannelNamePart(part) = panel_kind.decode(&raw).unwrap() else {
        panic!("wrong message kind");
    };
    assert_eq!(part.channel, 4); // the raw byte
}

/// The module stays unloaded until every editable channel name is known.
#[test]
fn module_loads_when_all_names_are_in() {
    let (mut module, _queue) = common::test_module(0x01, 0x11);
    assert!(!module.is_loaded());

    for channel in 1..=5u8 {
        for part in 1..=3u8 {
            module.on_message(
                0x01,
                &Message::ChannelNamePart(ChannelNamePart {
                    part,
                    channel,
                    name: format!("Rly {channel}").into_bytes(),
                    indexing: ChannelIndexing::Bit,
                }),
            );
        }
        let loaded_so_far = module.is_loaded();
        assert_eq!(loaded_so_far, channel == 5);
    }
}
