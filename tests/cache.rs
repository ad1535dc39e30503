//! Cache rehydration: a cached module skips the name/memory load and only
//! refreshes its runtime state.

mod common;

use common::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use velbus_lib::cache::{CachedChannel, CachedModule, load, store};

fn unique_cache_dir(tag: &str) -> std::path::PathBuf {
    let dir = common::test_cache_dir().join(tag);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn cached_relay_module() -> CachedModule {
    let channels = (1..=5u8)
        .map(|n| {
            (
                n,
                CachedChannel {
                    name: format!("Cached relay {n}"),
                    kind: "Relay".into(),
                    unit: None,
                    pulses_per_unit: None,
                },
            )
        })
        .collect();
    CachedModule {
        version: CACHE_VERSION,
        module_type: 0x11,
        name: "Garage relays".into(),
        channels,
    }
}

#[tokio::test(start_paused = true)]
async fn cached_module_skips_the_name_load() {
    let dir = unique_cache_dir("rehydrate");
    store(&dir, 0x22, &cached_relay_module());

    let protocol = ProtocolDescription::bundled().unwrap();
    let (sender, mut queue) = FrameSender::channel();
    let module = Module::new(
        0x22,
        0x11,
        protocol.module(0x11).unwrap().clone(),
        sender,
        dir,
    );
    let module = Arc::new(Mutex::new(module));
    load_module(module.clone(), true).await;

    let mut m = module.lock().await;
    assert!(m.is_cached());
    assert!(m.is_loaded());
    assert_eq!(m.get_name(), "Garage relays");
    assert_eq!(m.get_channel(3).unwrap().get_name(), "Cached relay 3");

    // Only the status refresh goes out, no name or memory requests.
    let frames = common::drain(&mut queue);
    assert!(frames.iter().any(|f| f.command() == Some(0xFA)));
    assert!(frames.iter().all(|f| f.command() != Some(0xEF)));
    assert!(frames.iter().all(|f| f.command() != Some(0xFD)));
}

#[tokio::test(start_paused = true)]
async fn version_or_type_mismatch_forces_a_live_load() {
    let dir = unique_cache_dir("stale");
    let mut stale = cached_relay_module();
    stale.version = CACHE_VERSION - 1;
    store(&dir, 0x22, &stale);
    assert!(load(&dir, 0x22, 0x11).is_none());

    let mut wrong_type = cached_relay_module();
    wrong_type.module_type = 0x10;
    store(&dir, 0x23, &wrong_type);
    assert!(load(&dir, 0x23, 0x11).is_none());
}

#[test]
fn corrupt_cache_files_are_ignored() {
    let dir = unique_cache_dir("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("34.json"), b"{ not json").unwrap();
    assert!(load(&dir, 34, 0x11).is_none());
    assert!(load(&dir, 35, 0x11).is_none());
}

#[tokio::test(start_paused = true)]
async fn finished_load_writes_the_cache_back() {
    let dir = unique_cache_dir("writeback");

    let protocol = ProtocolDescription::bundled().unwrap();
    let (sender, _queue) = FrameSender::channel();
    let module = Module::new(
        0x22,
        0x11,
        protocol.module(0x11).unwrap().clone(),
        sender,
        dir.clone(),
    );
    let module = Arc::new(Mutex::new(module));

    let load = tokio::spawn(load_module(module.clone(), false));
    // Feed all channel names while the load window is open.
    {
        let mut m = module.lock().await;
        for channel in 1..=5u8 {
            for part in 1..=3u8 {
                m.on_message(
                    0x22,
                    &Message::ChannelNamePart(ChannelNamePart {
                        part,
                        channel,
                        name: format!("R{channel}").into_bytes(),
                        indexing: ChannelIndexing::Bit,
                    }),
                );
            }
        }
    }
    load.await.unwrap();

    let written = load_cache_eventually(&dir, 0x22);
    assert_eq!(written.name, "VMB4RYNO");
    assert_eq!(written.channels.get(&2).unwrap().name, "R2");
}

fn load_cache_eventually(dir: &std::path::Path, address: u8) -> CachedModule {
    load(dir, address, 0x11).expect("cache file should have been written")
}
