//! Asynchronous client library for the Velbus home-automation bus.
//!
//! Connects to a bus through a TCP gateway (plain or TLS, with an optional
//! auth token) or a local serial interface, discovers every module on the
//! bus, learns channel layouts and names, keeps a live mirror of channel
//! state, and exposes typed operations that are translated into bus frames.

pub mod cache;
pub mod channels;
pub mod command_registry;
pub mod consts;
pub mod controller;
pub mod error;
pub mod frame;
mod handler;
pub mod messages;
pub mod module;
pub mod protocol;

mod connection;

// Re-export commonly used types
pub use channels::{Category, Channel, ChannelState, CounterUnit, LedState, NameState, Program};
pub use connection::FrameSender;
pub use controller::Velbus;
pub use error::{FrameError, MessageError, VelbusError};
pub use frame::RawMessage;
pub use messages::{Message, MessageKind};
pub use module::Module;
pub use protocol::ProtocolDescription;
