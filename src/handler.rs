//! Inbound frame routing: every decoded frame lands here, in arrival
//! order, and either advances the discovery state machine or mutates the
//! module it addresses.

use crate::command_registry::{COMMAND_REGISTRY, module_type_name};
use crate::connection::FrameSender;
use crate::frame::RawMessage;
use crate::messages::{Message, MessageKind};
use crate::module::{Module, ModuleRegistry, load_module};
use crate::protocol::ProtocolDescription;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::consts::LOAD_EVIDENCE_COMMANDS;

/// Discovery cursor, shared between the scan task and the handler: the
/// handler may observe a ModuleType reply concurrently with the scanner
/// advancing, so both sides take the same lock.
pub(crate) struct ScanState {
    pub active: bool,
    /// Next address the sweep will probe.
    pub cursor: u16,
    /// Address currently being awaited.
    pub probing: u8,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            active: false,
            cursor: 1,
            probing: 0,
        }
    }
}

#[derive(Clone)]
pub(crate) struct PacketHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    protocol: Arc<ProtocolDescription>,
    modules: Arc<Mutex<ModuleRegistry>>,
    scan: Arc<Mutex<ScanState>>,
    scan_reply: Arc<Notify>,
    sender: FrameSender,
    cache_dir: PathBuf,
    /// Cleared for the duration of a forced rescan.
    use_cache: AtomicBool,
}

impl PacketHandler {
    pub fn new(
        protocol: Arc<ProtocolDescription>,
        modules: Arc<Mutex<ModuleRegistry>>,
        scan: Arc<Mutex<ScanState>>,
        scan_reply: Arc<Notify>,
        sender: FrameSender,
        cache_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                protocol,
                modules,
                scan,
                scan_reply,
                sender,
                cache_dir,
                use_cache: AtomicBool::new(true),
            }),
        }
    }

    pub fn set_use_cache(&self, use_cache: bool) {
        self.inner.use_cache.store(use_cache, Ordering::SeqCst);
    }

    /// Single entry point for every frame read off the wire.
    pub async fn handle(&self, raw: &RawMessage) {
        let address = raw.address;
        if address == 0 || address == 255 {
            return;
        }
        let Some(command) = raw.command() else {
            return;
        };

        match command {
            0xFF => self.handle_module_type(raw).await,
            0xB0 | 0xA7 | 0xA6 => self.handle_module_subtype(raw, command).await,
            _ if self.inner.protocol.is_broadcast_ignored(command) => {}
            _ => self.dispatch_to_module(raw, command).await,
        }
    }

    /// A ModuleType reply: create the module if this address is new, and
    /// acknowledge (or rewind) the running address sweep.
    async fn handle_module_type(&self, raw: &RawMessage) {
        let address = raw.address;
        let decoded = match MessageKind::ModuleType.decode(raw) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("bad ModuleType reply from {address:#04x}: {err}");
                return;
            }
        };
        let Message::ModuleType(ref mtype) = decoded else {
            return;
        };

        let existing = self.inner.modules.lock().await.get(address);
        match existing {
            Some(module) => {
                module.lock().await.on_message(address, &decoded);
            }
            None => match self.inner.protocol.module(mtype.module_type) {
                Some(spec) => {
                    let module = Arc::new(Mutex::new(Module::new(
                        address,
                        mtype.module_type,
                        spec.clone(),
                        self.inner.sender.clone(),
                        self.inner.cache_dir.clone(),
                    )));
                    module.lock().await.on_message(address, &decoded);
                    self.inner
                        .modules
                        .lock()
                        .await
                        .insert_primary(address, module.clone());
                    let use_cache = self.inner.use_cache.load(Ordering::SeqCst);
                    tokio::spawn(load_module(module, use_cache));
                }
                None => {
                    warn!(
                        "module not recognized: {} ({:02X}) @ {address:#04x}",
                        module_type_name(mtype.module_type),
                        mtype.module_type
                    );
                }
            },
        }

        // Scan bookkeeping under the cursor lock. A reply from below the
        // cursor means Velbuslink or another tool is scanning in parallel;
        // rewind and requery from there.
        let mut scan = self.inner.scan.lock().await;
        if scan.active {
            if (address as u16) < scan.cursor.saturating_sub(1) {
                debug!(
                    "ModuleType reply from {address:#04x} below scan cursor {}, rewinding",
                    scan.cursor
                );
                scan.cursor = address as u16;
            }
            if address == scan.probing {
                self.inner.scan_reply.notify_one();
            }
        }
    }

    /// ModuleSubType replies carry the extra 8-channel banks of the large
    /// input panels; each populated sub-address aliases the primary module.
    async fn handle_module_subtype(&self, raw: &RawMessage, command: u8) {
        let kind = match command {
            0xA7 => MessageKind::ModuleSubTypeBank4,
            0xA6 => MessageKind::ModuleSubTypeBank8,
            _ => MessageKind::ModuleSubType,
        };
        let decoded = match kind.decode(raw) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("bad ModuleSubType reply from {:#04x}: {err}", raw.address);
                return;
            }
        };
        let Some(module) = self.inner.modules.lock().await.get(raw.address) else {
            return;
        };
        let subs = {
            let mut m = module.lock().await;
            m.on_message(raw.address, &decoded);
            m.sub_address_list()
        };
        let mut modules = self.inner.modules.lock().await;
        for sub in subs {
            if !modules.contains(sub) {
                modules.insert_alias(sub, &module);
            }
        }
    }

    async fn dispatch_to_module(&self, raw: &RawMessage, command: u8) {
        let Some(module) = self.inner.modules.lock().await.get(raw.address) else {
            debug!(
                "message {command:#04x} for unknown module @ {:#04x}",
                raw.address
            );
            return;
        };

        let mut m = module.lock().await;
        let module_type = m.get_type();
        match COMMAND_REGISTRY.get(command, module_type) {
            Some(kind) => match kind.decode(raw) {
                Ok(msg) => m.on_message(raw.address, &msg),
                Err(err) => warn!(
                    "could not decode {command:#04x} for {} @ {:#04x}: {err}",
                    m.get_type_name(),
                    raw.address
                ),
            },
            None => warn!(
                "unknown command {command:#04x} for {} @ {:#04x}",
                m.get_type_name(),
                raw.address
            ),
        }

        // Name and memory replies prove the module is still answering its
        // load; extend the inactivity budget.
        if LOAD_EVIDENCE_COMMANDS.contains(&command) {
            m.touch();
        }
    }
}
