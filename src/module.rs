//! Runtime module model: the per-address mirror of one physical module,
//! its channels, and the load sequence that fills in names and settings.

use crate::cache::{self, CachedChannel, CachedModule};
use crate::channels::{
    Channel, ChannelState, CounterUnit, DimmerScale, LedState, NameState, Program,
};
use crate::connection::FrameSender;
use crate::consts::*;
use crate::messages::*;
use crate::protocol::{ChannelKindSpec, ChannelSpec, MemoryDirective, ModuleSpec};
use num_enum::FromPrimitive;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The modules map: primary entries own the module, sub-address entries are
/// weak aliases resolving to the same module.
#[derive(Default)]
pub(crate) struct ModuleRegistry {
    entries: HashMap<u8, ModuleEntry>,
}

enum ModuleEntry {
    Primary(Arc<Mutex<Module>>),
    Alias(Weak<Mutex<Module>>),
}

impl ModuleRegistry {
    pub fn insert_primary(&mut self, address: u8, module: Arc<Mutex<Module>>) {
        self.entries.insert(address, ModuleEntry::Primary(module));
    }

    pub fn insert_alias(&mut self, address: u8, module: &Arc<Mutex<Module>>) {
        self.entries
            .insert(address, ModuleEntry::Alias(Arc::downgrade(module)));
    }

    pub fn get(&self, address: u8) -> Option<Arc<Mutex<Module>>> {
        match self.entries.get(&address)? {
            ModuleEntry::Primary(module) => Some(module.clone()),
            ModuleEntry::Alias(weak) => weak.upgrade(),
        }
    }

    pub fn contains(&self, address: u8) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn primaries(&self) -> Vec<(u8, Arc<Mutex<Module>>)> {
        let mut primaries: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(addr, entry)| match entry {
                ModuleEntry::Primary(module) => Some((*addr, module.clone())),
                ModuleEntry::Alias(_) => None,
            })
            .collect();
        primaries.sort_by_key(|(addr, _)| *addr);
        primaries
    }

    pub fn alias_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, ModuleEntry::Alias(_)))
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct Module {
    address: u8,
    module_type: u8,
    spec: ModuleSpec,
    pub serial: u16,
    pub memory_map_version: u8,
    pub build_year: u8,
    pub build_week: u8,
    name: NameState,
    /// Sub index (0-based bank slot) → bus address.
    sub_addresses: BTreeMap<u8, u8>,
    channels: BTreeMap<u8, Channel>,
    /// Thermostat output channels by role name (Heater, Boost, ...).
    thermostat_channels: HashMap<String, u8>,
    loading: bool,
    loaded: bool,
    cached: bool,
    /// Last name/memory reply; drives the load inactivity window.
    last_info: Option<Instant>,
    /// DALI group index → member channels.
    dali_groups: HashMap<u8, Vec<u8>>,
    sender: FrameSender,
    cache_dir: PathBuf,
}

impl Module {
    pub fn new(
        address: u8,
        module_type: u8,
        spec: ModuleSpec,
        sender: FrameSender,
        cache_dir: PathBuf,
    ) -> Self {
        let mut channels = BTreeMap::new();
        let mut thermostat_channels = HashMap::new();
        for (num, chan_spec) in &spec.channels {
            if chan_spec.kind == ChannelKindSpec::ThermostatChannel {
                thermostat_channels.insert(chan_spec.name.clone(), *num);
            }
            channels.insert(
                *num,
                Channel::new(
                    address,
                    module_type,
                    &spec.type_name,
                    *num,
                    chan_spec,
                    sender.clone(),
                ),
            );
        }
        info!(
            "found module {} ({:02X}) @ {address:#04x}",
            spec.type_name, module_type
        );
        Self {
            address,
            module_type,
            spec,
            serial: 0,
            memory_map_version: 0,
            build_year: 0,
            build_week: 0,
            name: NameState::new(),
            sub_addresses: BTreeMap::new(),
            channels,
            thermostat_channels,
            loading: false,
            loaded: false,
            cached: false,
            last_info: None,
            dali_groups: HashMap::new(),
            sender,
            cache_dir,
        }
    }

    pub fn get_type(&self) -> u8 {
        self.module_type
    }

    pub fn get_type_name(&self) -> &str {
        &self.spec.type_name
    }

    /// Primary address first, then populated sub-addresses in bank order.
    pub fn get_addresses(&self) -> Vec<u8> {
        let mut addresses = vec![self.address];
        addresses.extend(self.sub_addresses.values().copied());
        addresses
    }

    pub fn get_address(&self) -> u8 {
        self.address
    }

    pub fn get_name(&self) -> String {
        match &self.name {
            NameState::Complete(name) => name.clone(),
            _ => self.spec.type_name.clone(),
        }
    }

    pub fn get_channels(&self) -> &BTreeMap<u8, Channel> {
        &self.channels
    }

    pub fn get_channel(&self, num: u8) -> Option<&Channel> {
        self.channels.get(&num)
    }

    pub fn get_channel_mut(&mut self, num: u8) -> Option<&mut Channel> {
        self.channels.get_mut(&num)
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn is_dali(&self) -> bool {
        self.spec.dali
    }

    /// Loaded once the module name (where one exists in memory) and every
    /// editable channel name are complete.
    pub fn is_loaded(&mut self) -> bool {
        if self.loaded {
            return true;
        }
        let name_done = !self.has_module_name_directive() || self.name.is_complete();
        if name_done && self.channels.values().all(|c| c.is_loaded()) {
            self.loaded = true;
        }
        self.loaded
    }

    fn has_module_name_directive(&self) -> bool {
        self.module_name_directive_count() > 0
    }

    fn module_name_directive_count(&self) -> usize {
        self.spec
            .memory
            .values()
            .filter(|d| matches!(d, MemoryDirective::ModuleName(_)))
            .count()
    }

    fn name_positions_filled(&self) -> usize {
        match &self.name {
            NameState::AssemblingPositions { positions } => positions.len(),
            _ => 0,
        }
    }

    /// Evidence that the module is still answering its load.
    pub(crate) fn touch(&mut self) {
        self.last_info = Some(Instant::now());
    }

    pub(crate) fn last_info(&self) -> Option<Instant> {
        self.last_info
    }

    /// Channel-number offset contributed by the sub-address a frame arrived
    /// on. Bank slot n covers channels n*8+9 .. n*8+16.
    pub fn channel_offset(&self, source_address: u8) -> u8 {
        if source_address == self.address {
            return 0;
        }
        self.sub_addresses
            .iter()
            .find(|(_, addr)| **addr == source_address)
            .map(|(idx, _)| (idx + 1) * 8)
            .unwrap_or(0)
    }

    // ---- inbound dispatch ----

    /// Apply one decoded message to the channel mirror. `source_address` is
    /// the bus address the frame arrived on; bit-indexed channel numbers
    /// shift by the sub-address bank offset.
    pub fn on_message(&mut self, source_address: u8, msg: &Message) {
        let offset = self.channel_offset(source_address);
        match msg {
            Message::RelayStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&(status.channel + offset)) {
                    chan.update_relay(
                        status.is_on(),
                        status.override_state == OverrideState::Inhibited,
                        status.override_state == OverrideState::ForcedOn,
                        status.override_state == OverrideState::Disabled,
                    );
                }
            }
            Message::DimmerChannelStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&(status.channel + offset)) {
                    chan.update_dimmer_state(status.state);
                }
            }
            Message::DimmerStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&1) {
                    chan.update_dimmer_state(status.state);
                }
            }
            Message::SliderStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&(status.channel + offset)) {
                    chan.update_dimmer_state(status.state);
                }
            }
            Message::BlindStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&status.channel) {
                    chan.update_blind(status.state, None);
                }
            }
            Message::BlindStatusNg(status) => {
                if let Some(chan) = self.channels.get_mut(&status.channel) {
                    chan.update_blind(status.state, Some(status.position));
                }
            }
            Message::PushButtonStatus(status) => {
                for num in &status.closed {
                    if let Some(chan) = self.channels.get_mut(&(num + offset)) {
                        chan.update_closed(true);
                    }
                }
                for num in &status.opened {
                    if let Some(chan) = self.channels.get_mut(&(num + offset)) {
                        chan.update_closed(false);
                        chan.update_long_pressed(false);
                    }
                }
                for num in &status.closed_long {
                    if let Some(chan) = self.channels.get_mut(&(num + offset)) {
                        chan.update_long_pressed(true);
                    }
                }
            }
            Message::ModuleStatus(status) => {
                self.apply_bank_closed(&status.closed, offset);
                self.apply_led_bank(
                    &status.led_on,
                    &status.led_slow_blinking,
                    &status.led_fast_blinking,
                    offset,
                );
            }
            Message::ModuleStatus2(status) => {
                self.apply_bank_closed(&status.closed, offset);
                for bit in 1..=8u8 {
                    if let Some(chan) = self.channels.get_mut(&(bit + offset)) {
                        chan.update_enabled(status.enabled.contains(&bit));
                    }
                }
                self.update_selected_program(status.selected_program);
            }
            Message::ModuleStatusPir(status) => {
                for (bit, value) in status.channel_bits().iter().enumerate() {
                    if let Some(chan) = self.channels.get_mut(&(bit as u8 + 1 + offset)) {
                        chan.update_closed(*value);
                    }
                }
                if let Some(chan) = self.channels.get_mut(&CHANNEL_LIGHT_VALUE) {
                    chan.update_sensor_value(status.light_value as f64, None);
                }
                self.update_selected_program(status.selected_program);
            }
            Message::ModuleStatusGp4Pir(status) => {
                self.apply_bank_closed(&status.closed, offset);
                if let Some(chan) = self.channels.get_mut(&CHANNEL_LIGHT_VALUE) {
                    chan.update_sensor_value(status.light_value as f64, None);
                }
                self.update_selected_program(status.selected_program);
            }
            Message::CounterStatus(status) => {
                if let Some(chan) = self.channels.get_mut(&(status.channel + offset)) {
                    chan.update_counter(status.pulses, status.counter, status.delay);
                }
            }
            Message::SensorTemperature(temp) => {
                if let Some(chan) = self.temperature_channel_mut() {
                    chan.maybe_update_temperature(temp.cur, TEMP_PRECISION_FINE);
                    chan.update_min_max(temp.min, temp.max);
                }
            }
            Message::TempSensorStatus(status) => {
                for (role, active) in [
                    ("Heater", status.heater),
                    ("Boost", status.boost),
                    ("Pump", status.pump),
                    ("Cooler", status.cooler),
                    ("Alarm 1", status.alarm1),
                    ("Alarm 2", status.alarm2),
                    ("Alarm 3", status.alarm3),
                    ("Alarm 4", status.alarm4),
                ] {
                    if let Some(num) = self.thermostat_channels.get(role).copied() {
                        if let Some(chan) = self.channels.get_mut(&num) {
                            chan.update_thermostat_output(active);
                        }
                    }
                }
                if let Some(chan) = self.temperature_channel_mut() {
                    chan.maybe_update_temperature(status.current_temp, TEMP_PRECISION_COARSE);
                    chan.update_climate(
                        status.preset,
                        status.mode,
                        status.target_temp,
                        status.sleep_timer,
                    );
                }
            }
            Message::MeteoRaw(meteo) => {
                for (num, value) in [(11u8, meteo.rain), (12, meteo.light), (13, meteo.wind)] {
                    if let Some(chan) = self.channels.get_mut(&num) {
                        chan.update_sensor_value(value, None);
                    }
                }
            }
            Message::SensorRaw(raw) => {
                if let Some(chan) = self.channels.get_mut(&raw.sensor) {
                    chan.update_sensor_value(raw.value, Some(raw.mode.to_string()));
                }
            }
            Message::ChannelNamePart(part) => self.process_name_part(part, offset),
            Message::MemoryData(data) => {
                self.process_memory_byte(data.address(), data.data);
            }
            Message::MemoryDataBlock(block) => {
                for (i, byte) in block.block.iter().enumerate() {
                    self.process_memory_byte(block.address() + i as u16, *byte);
                }
            }
            Message::SetLed(leds) => self.set_led_bank(&leds.channels, offset, LedState::On),
            Message::ClearLed(leds) => self.set_led_bank(&leds.channels, offset, LedState::Off),
            Message::SlowBlinkingLed(leds) => {
                self.set_led_bank(&leds.channels, offset, LedState::Slow)
            }
            Message::FastBlinkingLed(leds) => {
                self.set_led_bank(&leds.channels, offset, LedState::Fast)
            }
            Message::UpdateLedStatus(status) => {
                for bit in 1..=8u8 {
                    let state = if status.led_on.contains(&bit) {
                        LedState::On
                    } else if status.led_slow_blinking.contains(&bit) {
                        LedState::Slow
                    } else if status.led_fast_blinking.contains(&bit) {
                        LedState::Fast
                    } else {
                        LedState::Off
                    };
                    if let Some(chan) = self.channels.get_mut(&(bit + offset)) {
                        chan.update_led_state(state);
                    }
                }
            }
            Message::SelectProgram(select) => self.update_selected_program(select.program),
            Message::ModuleType(mtype) => {
                self.serial = mtype.serial;
                self.memory_map_version = mtype.memory_map_version;
                self.build_year = mtype.build_year;
                self.build_week = mtype.build_week;
            }
            Message::ModuleSubType(subtype) => self.process_sub_type(subtype),
            Message::DaliDeviceSettings(settings) => self.process_dali_settings(settings),
            Message::DimValueStatus(status) => self.process_dim_values(status),
            _ => {
                debug!(
                    "no state mutation for {msg:?} on {} @ {:#04x}",
                    self.spec.type_name, self.address
                );
            }
        }
    }

    fn apply_bank_closed(&mut self, closed: &[u8], offset: u8) {
        for bit in 1..=8u8 {
            if let Some(chan) = self.channels.get_mut(&(bit + offset)) {
                chan.update_closed(closed.contains(&bit));
            }
        }
    }

    fn apply_led_bank(&mut self, on: &[u8], slow: &[u8], fast: &[u8], offset: u8) {
        for bit in 1..=8u8 {
            let state = if on.contains(&bit) {
                LedState::On
            } else if slow.contains(&bit) {
                LedState::Slow
            } else if fast.contains(&bit) {
                LedState::Fast
            } else {
                LedState::Off
            };
            if let Some(chan) = self.channels.get_mut(&(bit + offset)) {
                chan.update_led_state(state);
            }
        }
    }

    fn set_led_bank(&mut self, channels: &[u8], offset: u8, state: LedState) {
        for num in channels {
            if let Some(chan) = self.channels.get_mut(&(num + offset)) {
                chan.update_led_state(state);
            }
        }
    }

    fn update_selected_program(&mut self, program: u8) {
        if let Some(chan) = self.channels.get_mut(&CHANNEL_SELECTED_PROGRAM) {
            chan.update_selected_program(Program::from_primitive(program));
        }
    }

    fn temperature_channel_mut(&mut self) -> Option<&mut Channel> {
        let num = self.spec.temperature_channel?;
        self.channels.get_mut(&num)
    }

    fn process_name_part(&mut self, part: &ChannelNamePart, offset: u8) {
        let mut channel = part.channel;
        if part.indexing == ChannelIndexing::Bit {
            channel += offset;
        }
        if !self.channels.contains_key(&channel) {
            if let Some(mapped) = self.spec.name_map.get(&part.channel) {
                channel = *mapped;
            }
        }
        match self.channels.get_mut(&channel) {
            Some(chan) => {
                chan.name_mut().set_part(part.part, &part.name);
            }
            None => debug!(
                "name part for unknown channel {channel} on {} @ {:#04x}",
                self.spec.type_name, self.address
            ),
        }
    }

    fn process_memory_byte(&mut self, address: u16, byte: u8) {
        let Some(directive) = self.spec.memory.get(&address).cloned() else {
            return;
        };
        match directive {
            MemoryDirective::ModuleName(position) => {
                if self.name.is_complete() {
                    return;
                }
                if byte == 0xFF {
                    // 0xFF pads unused name bytes and doubles as the save
                    // marker: the name is complete as soon as one arrives.
                    self.name.commit_positions();
                } else if let Ok(position) = position.parse::<u8>() {
                    self.name.set_position(position, byte);
                    // A name filling every mapped byte never sees the pad
                    // marker; commit once all positions are in.
                    if self.name_positions_filled() == self.module_name_directive_count() {
                        self.name.commit_positions();
                    }
                }
            }
            MemoryDirective::CounterUnit { channel } => {
                let unit = match byte & 0x03 {
                    0 => CounterUnit::LitersPerHour,
                    1 => CounterUnit::CubicMetersPerHour,
                    _ => CounterUnit::KilowattHours,
                };
                if let Some(chan) = self.channels.get_mut(&channel) {
                    chan.update_counter_unit(unit);
                }
            }
            MemoryDirective::CounterPulses { channel } => {
                let base = ((byte & 0x3F) as f64) * 100.0;
                let multiplier = match byte >> 6 {
                    0 => 1.0,
                    1 => 2.5,
                    2 => 0.05,
                    _ => 0.01,
                };
                if let Some(chan) = self.channels.get_mut(&channel) {
                    chan.update_counter_pulses(base * multiplier);
                }
            }
        }
    }

    fn process_sub_type(&mut self, subtype: &ModuleSubType) {
        self.serial = subtype.serial;
        for (i, sub) in subtype.sub_addresses.iter().enumerate() {
            if *sub == 0xFF {
                continue;
            }
            let idx = subtype.bank + i as u8;
            self.sub_addresses.insert(idx, *sub);
            // Banked buttons drive their LEDs through the sub-address.
            let offset = (idx + 1) * 8;
            for bit in 1..=8u8 {
                if let Some(chan) = self.channels.get_mut(&(bit + offset)) {
                    chan.set_led_route(*sub, bit);
                }
            }
        }
    }

    /// Sub-addresses this module advertised, in bank order.
    pub(crate) fn sub_address_list(&self) -> Vec<u8> {
        self.sub_addresses.values().copied().collect()
    }

    // ---- DALI runtime channel discovery ----

    fn process_dali_settings(&mut self, settings: &DaliDeviceSettings) {
        match &settings.value {
            DaliSettingValue::DeviceType(DaliDeviceType::NoDevicePresent) => {
                if self.channels.remove(&settings.channel).is_some() {
                    debug!(
                        "DALI channel {} removed, no device present",
                        settings.channel
                    );
                }
                for members in self.dali_groups.values_mut() {
                    members.retain(|c| *c != settings.channel);
                }
            }
            DaliSettingValue::DeviceType(_) => {
                if let Some(chan) = self.channels.get_mut(&settings.channel) {
                    chan.replace_state(ChannelState::Dimmer {
                        state: 0,
                        scale: DimmerScale::Dali,
                    });
                }
            }
            DaliSettingValue::MemberOfGroup(groups) => {
                for members in self.dali_groups.values_mut() {
                    members.retain(|c| *c != settings.channel);
                }
                for group in groups {
                    let members = self.dali_groups.entry(*group).or_default();
                    if !members.contains(&settings.channel) {
                        members.push(settings.channel);
                    }
                }
            }
            DaliSettingValue::ActualLevel(level) => {
                if let Some(chan) = self.channels.get_mut(&settings.channel) {
                    chan.update_dimmer_state(*level);
                }
            }
            DaliSettingValue::Raw { .. } => {}
        }
    }

    fn process_dim_values(&mut self, status: &DimValueStatus) {
        for (i, value) in status.dim_values.iter().enumerate() {
            let index = status.channel.saturating_add(i as u8);
            match index {
                1..=DALI_DEVICE_COUNT => {
                    if let Some(chan) = self.channels.get_mut(&index) {
                        chan.update_dimmer_state(*value);
                    }
                }
                DALI_FIRST_GROUP..DALI_BROADCAST => {
                    let group = index - DALI_FIRST_GROUP;
                    for num in self.dali_groups.get(&group).cloned().unwrap_or_default() {
                        if let Some(chan) = self.channels.get_mut(&num) {
                            chan.update_dimmer_state(*value);
                        }
                    }
                }
                DALI_BROADCAST => {
                    for chan in self.channels.values_mut() {
                        chan.update_dimmer_state(*value);
                    }
                }
                _ => {}
            }
        }
    }

    /// Channel ↔ group membership learned from the gateway.
    pub fn dali_group_members(&self, group: u8) -> &[u8] {
        self.dali_groups
            .get(&group)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // ---- load sequence ----

    fn begin_load(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.last_info = None;
        true
    }

    fn request_initial(&self) {
        self.sender.send(
            self.address,
            &Message::ModuleStatusRequest(ModuleStatusRequest::all()),
        );
        for chan in self.channels.values() {
            if chan.is_counter_channel() {
                self.sender.send(
                    self.address,
                    &Message::CounterStatusRequest(CounterStatusRequest),
                );
            }
        }
    }

    fn request_names(&self) {
        let editable: Vec<&Channel> = self
            .channels
            .values()
            .filter(|c| c.is_name_editable() && !c.is_loaded())
            .collect();
        if editable.is_empty() {
            return;
        }
        if self.spec.all_channel_status {
            self.sender.send(
                self.address,
                &Message::ChannelNameRequest(ChannelNameRequest::all()),
            );
        } else {
            for chan in editable {
                chan.request_name();
            }
        }
    }

    fn request_memory(&self) {
        for address in self.spec.memory.keys() {
            self.sender.send(
                self.address,
                &Message::ReadDataFromMemory(ReadDataFromMemory::new(*address)),
            );
        }
    }

    fn dali_prepare(&mut self) {
        for num in 1..=DALI_DEVICE_COUNT {
            let spec = ChannelSpec {
                kind: ChannelKindSpec::Dimmer,
                name: format!("Channel {num}"),
                editable: true,
            };
            self.channels.insert(
                num,
                Channel::new(
                    self.address,
                    self.module_type,
                    &self.spec.type_name,
                    num,
                    &spec,
                    self.sender.clone(),
                ),
            );
        }
        for num in 1..=DALI_DEVICE_COUNT {
            self.sender.send(
                self.address,
                &Message::DaliDeviceSettingsRequest(DaliDeviceSettingsRequest::all_settings(num)),
            );
        }
    }

    fn dali_request_names(&self) {
        for chan in self.channels.values() {
            if chan.is_name_editable() && !chan.is_loaded() {
                chan.request_name();
            }
        }
    }

    fn finish_load(&mut self, write_cache: bool) {
        self.loading = false;
        if self.is_loaded() {
            if write_cache {
                self.write_cache();
            }
        } else {
            warn!(
                "load window closed for {} @ {:#04x} with incomplete data",
                self.spec.type_name, self.address
            );
        }
    }

    // ---- cache ----

    fn apply_cache(&mut self, cached: CachedModule) {
        self.name.force(cached.name);
        for (num, cc) in cached.channels {
            match self.channels.get_mut(&num) {
                Some(chan) => chan.set_cached_name(cc.name.clone()),
                None if self.spec.dali => {
                    let spec = ChannelSpec {
                        kind: ChannelKindSpec::Dimmer,
                        name: cc.name.clone(),
                        editable: true,
                    };
                    let mut chan = Channel::new(
                        self.address,
                        self.module_type,
                        &self.spec.type_name,
                        num,
                        &spec,
                        self.sender.clone(),
                    );
                    chan.set_cached_name(cc.name.clone());
                    self.channels.insert(num, chan);
                }
                None => continue,
            }
            if let Some(chan) = self.channels.get_mut(&num) {
                if let Some(unit) = cc.unit.as_deref().and_then(CounterUnit::from_name) {
                    chan.update_counter_unit(unit);
                }
                if let Some(ppu) = cc.pulses_per_unit {
                    chan.update_counter_pulses(ppu);
                }
            }
        }
        self.cached = true;
    }

    fn write_cache(&self) {
        let channels = self
            .channels
            .iter()
            .map(|(num, chan)| {
                (
                    *num,
                    CachedChannel {
                        name: chan.get_name(),
                        kind: chan.state().kind_name().to_string(),
                        unit: chan.get_counter_unit().map(|u| u.as_str().to_string()),
                        pulses_per_unit: match chan.get_pulses_per_unit() {
                            ppu if ppu > 0.0 => Some(ppu),
                            _ => None,
                        },
                    },
                )
            })
            .collect();
        let cached = CachedModule {
            version: CACHE_VERSION,
            module_type: self.module_type,
            name: self.get_name(),
            channels,
        };
        cache::store(&self.cache_dir, self.address, &cached);
    }
}

/// Drive one module through its load phases. Spawned by the packet handler
/// when the module is created; `use_cache` is false on a forced rescan.
pub async fn load_module(module: Arc<Mutex<Module>>, use_cache: bool) {
    let (address, module_type, cache_dir, dali) = {
        let m = module.lock().await;
        (
            m.address,
            m.module_type,
            m.cache_dir.clone(),
            m.is_dali(),
        )
    };

    let cached = if use_cache {
        cache::load(&cache_dir, address, module_type)
    } else {
        None
    };

    {
        let mut m = module.lock().await;
        if !m.begin_load() {
            return;
        }
        if let Some(cached) = cached {
            debug!("rehydrating module @ {address:#04x} from cache");
            m.apply_cache(cached);
            // Names are served from the cache; the runtime state still
            // needs a refresh from the bus.
            m.request_initial();
            m.finish_load(false);
            return;
        }
        if dali {
            m.dali_prepare();
        } else {
            m.request_initial();
            m.request_names();
            m.request_memory();
        }
    }

    wait_for_quiet(&module).await;

    if dali {
        module.lock().await.dali_request_names();
        wait_for_quiet(&module).await;
    }

    module.lock().await.finish_load(true);
}

/// Wait until the module has been silent for the info interval: an initial
/// grace period, then every name/memory reply extends the window.
async fn wait_for_quiet(module: &Arc<Mutex<Module>>) {
    let mut deadline = Instant::now() + SCAN_MODULEINFO_TIMEOUT_INITIAL;
    loop {
        tokio::time::sleep_until(deadline).await;
        let last_info = module.lock().await.last_info();
        match last_info {
            Some(t) if t + SCAN_MODULEINFO_TIMEOUT_INTERVAL > Instant::now() => {
                deadline = t + SCAN_MODULEINFO_TIMEOUT_INTERVAL;
            }
            _ => break,
        }
    }
}
