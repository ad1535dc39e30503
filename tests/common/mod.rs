//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::{Bytes, BytesMut};
#[allow(unused_imports)]
pub use velbus_lib::channels::{Category, Channel, ChannelState, CounterUnit, LedState, Program};
#[allow(unused_imports)]
pub use velbus_lib::command_registry::COMMAND_REGISTRY;
#[allow(unused_imports)]
pub use velbus_lib::consts::*;
#[allow(unused_imports)]
pub use velbus_lib::frame::{RawMessage, checksum, next_frame};
#[allow(unused_imports)]
pub use velbus_lib::messages::*;
#[allow(unused_imports)]
pub use velbus_lib::module::{Module, load_module};
#[allow(unused_imports)]
pub use velbus_lib::protocol::ProtocolDescription;
#[allow(unused_imports)]
pub use velbus_lib::{FrameSender, Message, MessageKind};

use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> BytesMut {
    BytesMut::from(hex::decode(hex_data).expect("Failed to decode hex").as_slice())
}

/// Install a subscriber honoring RUST_LOG so failing tests can be rerun
/// with protocol traces.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Build a module of the given type from the bundled protocol description,
/// wired to an observable outbound queue instead of a transport.
#[allow(dead_code)]
pub fn test_module(address: u8, module_type: u8) -> (Module, UnboundedReceiver<RawMessage>) {
    let protocol = ProtocolDescription::bundled().expect("bundled protocol");
    let spec = protocol
        .module(module_type)
        .unwrap_or_else(|| panic!("module type {module_type:02X} not in protocol.json"))
        .clone();
    let (sender, queue) = FrameSender::channel();
    let module = Module::new(address, module_type, spec, sender, test_cache_dir());
    (module, queue)
}

#[allow(dead_code)]
pub fn test_cache_dir() -> PathBuf {
    std::env::temp_dir().join("velbus-lib-tests")
}

/// Drain the outbound queue into a vector.
#[allow(dead_code)]
pub fn drain(queue: &mut UnboundedReceiver<RawMessage>) -> Vec<RawMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = queue.try_recv() {
        frames.push(frame);
    }
    frames
}
