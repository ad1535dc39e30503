//! Public controller: owns the connection engine, the packet handler, the
//! module inventory and the discovery state machine.

use crate::cache;
use crate::channels::Category;
use crate::connection::{self, Dsn, FrameSender, run_connection};
use crate::consts::*;
use crate::error::VelbusError;
use crate::frame::RawMessage;
use crate::handler::{PacketHandler, ScanState};
use crate::messages::{
    Message, ModuleTypeRequest, SetDate, SetDaylightSaving, SetRealtimeClock,
};
use crate::module::{Module, ModuleRegistry};
use crate::protocol::ProtocolDescription;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{info, warn};

/// Asynchronous Velbus controller.
///
/// ```no_run
/// use velbus_lib::Velbus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut velbus = Velbus::new("tcp://192.168.1.9:27015");
/// velbus.connect(false).await?;
/// velbus.scan(false).await;
/// for (addr, module) in velbus.get_modules().await {
///     println!("{addr:#04x}: {}", module.lock().await.get_name());
/// }
/// velbus.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Velbus {
    dsn: String,
    protocol_path: Option<PathBuf>,
    cache_dir: PathBuf,
    modules: Arc<Mutex<ModuleRegistry>>,
    scan: Arc<Mutex<ScanState>>,
    scan_reply: Arc<Notify>,
    sender: FrameSender,
    queue: Option<mpsc::UnboundedReceiver<RawMessage>>,
    handler: Option<PacketHandler>,
    closing: Arc<AtomicBool>,
    stop_tx: Option<watch::Sender<bool>>,
    engine: Option<JoinHandle<()>>,
}

impl Velbus {
    pub fn new(dsn: &str) -> Self {
        let (sender, queue) = FrameSender::channel();
        Self {
            dsn: dsn.to_string(),
            protocol_path: None,
            cache_dir: cache::default_cache_dir(),
            modules: Arc::new(Mutex::new(ModuleRegistry::default())),
            scan: Arc::new(Mutex::new(ScanState::new())),
            scan_reply: Arc::new(Notify::new()),
            sender,
            queue: Some(queue),
            handler: None,
            closing: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            engine: None,
        }
    }

    /// Override the per-module cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Load the protocol description from a file instead of the bundled
    /// resource.
    pub fn with_protocol_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.protocol_path = Some(path.into());
        self
    }

    /// Open the connection. With `test_only` the transport is connected,
    /// then immediately closed again, without starting the engine.
    pub async fn connect(&mut self, test_only: bool) -> Result<(), VelbusError> {
        let dsn = Dsn::parse(&self.dsn)?;

        if test_only {
            let _stream = connection::connect_transport(&dsn).await?;
            return Ok(());
        }

        let protocol = Arc::new(match &self.protocol_path {
            Some(path) => ProtocolDescription::from_file(path).await?,
            None => ProtocolDescription::bundled()?,
        });

        let queue = self
            .queue
            .take()
            .ok_or_else(|| VelbusError::ConnectionFailed("already connected".into()))?;

        let handler = PacketHandler::new(
            protocol,
            self.modules.clone(),
            self.scan.clone(),
            self.scan_reply.clone(),
            self.sender.clone(),
            self.cache_dir.clone(),
        );
        self.handler = Some(handler.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        let (first_tx, first_rx) = oneshot::channel();
        let engine = tokio::spawn(run_connection(
            dsn,
            handler,
            queue,
            self.closing.clone(),
            stop_rx,
            first_tx,
        ));
        self.stop_tx = Some(stop_tx);
        self.engine = Some(engine);

        first_rx
            .await
            .map_err(|_| VelbusError::ConnectionFailed("engine exited".into()))?
    }

    /// Stop: disable auto-reconnect, close the transport, cancel the
    /// writer and join the engine.
    pub async fn stop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(engine) = self.engine.take() {
            let _ = engine.await;
        }
    }

    /// Sweep addresses 1..254, load every module that answers, and wait
    /// for the inventory to finish loading. With `force_recache` the cache
    /// directory is cleared first and every module is loaded from the bus.
    pub async fn scan(&self, force_recache: bool) {
        if force_recache {
            cache::clear(&self.cache_dir);
            self.modules.lock().await.clear();
        }
        if let Some(handler) = &self.handler {
            handler.set_use_cache(!force_recache);
        }

        {
            let mut scan = self.scan.lock().await;
            if scan.active {
                return;
            }
            scan.active = true;
            scan.cursor = 1;
        }
        info!("starting Velbus address sweep");

        loop {
            let address = {
                let mut scan = self.scan.lock().await;
                if scan.cursor > 254 {
                    scan.active = false;
                    break;
                }
                let address = scan.cursor as u8;
                scan.probing = address;
                scan.cursor += 1;
                address
            };
            self.sender
                .send(address, &Message::ModuleTypeRequest(ModuleTypeRequest));
            let _ = timeout(SCAN_MODULETYPE_TIMEOUT, self.scan_reply.notified()).await;
        }

        info!("address sweep complete");
        self.wait_modules_loaded().await;
    }

    /// Poll until every discovered module reports loaded, bounded by
    /// thirty seconds per module and ten minutes overall. A timeout keeps
    /// the partial inventory and logs a warning.
    pub async fn wait_modules_loaded(&self) {
        let started = Instant::now();
        loop {
            let primaries = self.modules.lock().await.primaries();
            let total = primaries.len();
            let mut loaded = 0usize;
            for (_, module) in &primaries {
                if module.lock().await.is_loaded() {
                    loaded += 1;
                }
            }
            if loaded == total {
                info!("all {total} modules loaded");
                return;
            }
            let budget = LOAD_TIMEOUT.min(LOAD_TIMEOUT_PER_MODULE * total as u32);
            if started.elapsed() > budget {
                warn!(
                    "module load timed out after {:?}: {loaded}/{total} loaded, keeping partial inventory",
                    started.elapsed()
                );
                return;
            }
            tokio::time::sleep(LOAD_CHECK_INTERVAL).await;
        }
    }

    /// Enqueue a raw frame.
    pub fn send(&self, raw: RawMessage) {
        self.sender.send_raw(raw);
    }

    /// Enqueue a typed message for a module address.
    pub fn send_message(&self, address: u8, msg: &Message) {
        self.sender.send(address, msg);
    }

    pub async fn get_module(&self, address: u8) -> Option<Arc<Mutex<Module>>> {
        self.modules.lock().await.get(address)
    }

    /// All primary modules, ordered by address.
    pub async fn get_modules(&self) -> Vec<(u8, Arc<Mutex<Module>>)> {
        self.modules.lock().await.primaries()
    }

    /// Channel numbers of a module, with their names.
    pub async fn get_channels(&self, address: u8) -> Vec<(u8, String)> {
        match self.get_module(address).await {
            Some(module) => {
                let module = module.lock().await;
                module
                    .get_channels()
                    .iter()
                    .map(|(num, chan)| (*num, chan.get_name()))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Every channel carrying the given category tag, as
    /// `(module, channel number)` pairs.
    pub async fn get_all(&self, category: Category) -> Vec<(Arc<Mutex<Module>>, u8)> {
        let mut result = Vec::new();
        for (_, module) in self.modules.lock().await.primaries() {
            let channels: Vec<u8> = {
                let module = module.lock().await;
                module
                    .get_channels()
                    .iter()
                    .filter(|(_, chan)| chan.get_categories().contains(&category))
                    .map(|(num, _)| *num)
                    .collect()
            };
            for num in channels {
                result.push((module.clone(), num));
            }
        }
        result
    }

    /// Broadcast the host wall clock: time, date and DST flag.
    pub fn sync_clock(&self) {
        self.send_message(0x00, &Message::SetRealtimeClock(SetRealtimeClock::from_local_time()));
        self.send_message(0x00, &Message::SetDate(SetDate::from_local_time()));
        self.send_message(
            0x00,
            &Message::SetDaylightSaving(SetDaylightSaving::from_local_time()),
        );
    }

    /// Number of weak sub-address aliases in the modules map.
    pub async fn alias_count(&self) -> usize {
        self.modules.lock().await.alias_count()
    }
}

impl Drop for Velbus {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}
