//! Runtime channel model: one [`Channel`] per logical endpoint of a module,
//! with typed state per variant, observer callbacks, and operations that
//! translate into outgoing bus messages.

use crate::connection::FrameSender;
use crate::consts::{
    ENERGY_KILO_WATT_HOUR, TEMP_CELSIUS, VOLUME_CUBIC_METER_HOUR, VOLUME_LITERS_HOUR,
};
use crate::messages::{
    ChannelNameRequest, ClearLed, CoverDown, CoverOff, CoverPosition, CoverUp, DimmerChannelMode,
    FastBlinkingLed, MemoText, Message, RestoreDimmer, SelectProgram, SetDimmer, SetLed,
    SetTemperature, SlowBlinkingLed, SwitchRelayOff, SwitchRelayOn, SwitchToPreset,
};
use crate::messages::{ClimateMode, ClimatePreset};
use crate::protocol::{ChannelKindSpec, ChannelSpec};
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::Display;

/// Fired after every observable state change. Fire-and-forget.
pub type StatusCallback = Box<dyn Fn(&Channel) + Send + Sync>;

/// Home-automation category tags used by [`crate::Velbus::get_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Category {
    #[strum(to_string = "switch")]
    Switch,
    #[strum(to_string = "light")]
    Light,
    #[strum(to_string = "cover")]
    Cover,
    #[strum(to_string = "sensor")]
    Sensor,
    #[strum(to_string = "binary_sensor")]
    BinarySensor,
    #[strum(to_string = "climate")]
    Climate,
    #[strum(to_string = "button")]
    Button,
    #[strum(to_string = "led")]
    Led,
    #[strum(to_string = "select")]
    Select,
}

impl Category {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "switch" => Some(Category::Switch),
            "light" => Some(Category::Light),
            "cover" => Some(Category::Cover),
            "sensor" => Some(Category::Sensor),
            "binary_sensor" => Some(Category::BinarySensor),
            "climate" => Some(Category::Climate),
            "button" => Some(Category::Button),
            "led" => Some(Category::Led),
            "select" => Some(Category::Select),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum LedState {
    #[default]
    #[strum(to_string = "off")]
    Off,
    #[strum(to_string = "on")]
    On,
    #[strum(to_string = "slow")]
    Slow,
    #[strum(to_string = "fast")]
    Fast,
}

impl LedState {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "off" => Some(LedState::Off),
            "on" => Some(LedState::On),
            "slow" => Some(LedState::Slow),
            "fast" => Some(LedState::Fast),
            _ => None,
        }
    }
}

pub use crate::messages::BlindState;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, FromPrimitive, IntoPrimitive, Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum Program {
    #[strum(to_string = "none")]
    None = 0,
    #[strum(to_string = "summer")]
    Summer = 1,
    #[strum(to_string = "winter")]
    Winter = 2,
    #[strum(to_string = "holiday")]
    Holiday = 3,
    #[num_enum(catch_all)]
    #[strum(to_string = "unknown")]
    Unknown(u8),
}

impl Default for Program {
    fn default() -> Self {
        Program::None
    }
}

impl Program {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Program::None),
            "summer" => Some(Program::Summer),
            "winter" => Some(Program::Winter),
            "holiday" => Some(Program::Holiday),
            _ => None,
        }
    }
}

/// Counter unit of a pulse-counting input, decoded from module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum CounterUnit {
    #[strum(to_string = "L/h")]
    LitersPerHour,
    #[strum(to_string = "m³/h")]
    CubicMetersPerHour,
    #[strum(to_string = "kWh")]
    KilowattHours,
}

impl CounterUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterUnit::LitersPerHour => VOLUME_LITERS_HOUR,
            CounterUnit::CubicMetersPerHour => VOLUME_CUBIC_METER_HOUR,
            CounterUnit::KilowattHours => ENERGY_KILO_WATT_HOUR,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            VOLUME_LITERS_HOUR => Some(CounterUnit::LitersPerHour),
            VOLUME_CUBIC_METER_HOUR => Some(CounterUnit::CubicMetersPerHour),
            ENERGY_KILO_WATT_HOUR => Some(CounterUnit::KilowattHours),
            _ => None,
        }
    }
}

/// Name assembly state. Names arrive in up to three parts, or byte by byte
/// from a memory dump, and complete with a printable filter applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameState {
    Assembling { parts: BTreeMap<u8, Vec<u8>> },
    AssemblingPositions { positions: BTreeMap<u8, u8> },
    Complete(String),
}

impl NameState {
    pub fn new() -> Self {
        NameState::Assembling {
            parts: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, NameState::Complete(_))
    }

    /// Store one name fragment; completes the name once part 3 is in and
    /// all three parts are known.
    pub fn set_part(&mut self, part: u8, bytes: &[u8]) {
        let parts = match self {
            NameState::Assembling { parts } => parts,
            NameState::AssemblingPositions { .. } | NameState::Complete(_) => {
                *self = NameState::new();
                match self {
                    NameState::Assembling { parts } => parts,
                    _ => unreachable!(),
                }
            }
        };
        parts.insert(part, bytes.to_vec());
        if part == 3 && parts.len() == 3 {
            let mut raw = Vec::new();
            for bytes in parts.values() {
                raw.extend_from_slice(bytes);
            }
            *self = NameState::Complete(printable(&raw));
        }
    }

    /// Store one name character by byte position (memory-dump delivery).
    pub fn set_position(&mut self, position: u8, byte: u8) {
        let positions = match self {
            NameState::AssemblingPositions { positions } => positions,
            _ => {
                *self = NameState::AssemblingPositions {
                    positions: BTreeMap::new(),
                };
                match self {
                    NameState::AssemblingPositions { positions } => positions,
                    _ => unreachable!(),
                }
            }
        };
        positions.insert(position, byte);
    }

    /// Commit a position-assembled name (the 0xFF save marker arrived).
    /// A marker with no collected bytes yields an empty name.
    pub fn commit_positions(&mut self) {
        match self {
            NameState::AssemblingPositions { positions } => {
                let raw: Vec<u8> = positions.values().copied().collect();
                *self = NameState::Complete(printable(&raw));
            }
            NameState::Assembling { parts } if parts.is_empty() => {
                *self = NameState::Complete(String::new());
            }
            _ => {}
        }
    }

    pub fn force(&mut self, name: String) {
        *self = NameState::Complete(name);
    }
}

impl Default for NameState {
    fn default() -> Self {
        Self::new()
    }
}

fn printable(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| (0x20..0x7F).contains(*b))
        .map(|b| *b as char)
        .collect()
}

/// How a dimmer channel scales its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimmerScale {
    /// 0..100 percent (VMB4DC and friends).
    Percent,
    /// 0..254, 255 meaning "previous level" (DALI).
    Dali,
}

/// Variant-specific channel state.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    Relay {
        on: bool,
        enabled: bool,
        inhibit: bool,
        forced_on: bool,
        disabled: bool,
    },
    Dimmer {
        state: u8,
        scale: DimmerScale,
    },
    Blind {
        state: BlindState,
        position: Option<u8>,
        two_bit: bool,
    },
    Button {
        closed: bool,
        long: bool,
        enabled: bool,
        led_state: LedState,
    },
    ButtonCounter {
        closed: bool,
        enabled: bool,
        led_state: LedState,
        pulses: u32,
        counter: u32,
        delay: u16,
        unit: Option<CounterUnit>,
        pulses_per_unit: f64,
    },
    Sensor {
        closed: bool,
        enabled: bool,
    },
    ThermostatChannel {
        active: bool,
    },
    Temperature {
        cur: f64,
        min: Option<f64>,
        max: Option<f64>,
        target: f64,
        preset: ClimatePreset,
        mode: ClimateMode,
        sleep_timer: u16,
        precision: f64,
        thermostat: bool,
    },
    SensorNumber {
        value: f64,
        unit: Option<String>,
    },
    LightSensor {
        value: f64,
    },
    EdgeLit,
    Memo,
    SelectedProgram {
        program: Program,
    },
}

impl ChannelState {
    fn for_kind(kind: ChannelKindSpec, module_type_name: &str) -> Self {
        match kind {
            ChannelKindSpec::Relay => ChannelState::Relay {
                on: false,
                enabled: true,
                inhibit: false,
                forced_on: false,
                disabled: false,
            },
            ChannelKindSpec::Dimmer => ChannelState::Dimmer {
                state: 0,
                scale: if module_type_name.starts_with("VMBDALI") {
                    DimmerScale::Dali
                } else {
                    DimmerScale::Percent
                },
            },
            ChannelKindSpec::Blind => ChannelState::Blind {
                state: BlindState::Stopped,
                position: None,
                two_bit: matches!(module_type_name, "VMB1BL" | "VMB2BL"),
            },
            ChannelKindSpec::Button => ChannelState::Button {
                closed: false,
                long: false,
                enabled: true,
                led_state: LedState::Off,
            },
            ChannelKindSpec::ButtonCounter => ChannelState::ButtonCounter {
                closed: false,
                enabled: true,
                led_state: LedState::Off,
                pulses: 0,
                counter: 0,
                delay: 0,
                unit: None,
                pulses_per_unit: 0.0,
            },
            ChannelKindSpec::Sensor => ChannelState::Sensor {
                closed: false,
                enabled: true,
            },
            ChannelKindSpec::ThermostatChannel => ChannelState::ThermostatChannel { active: false },
            ChannelKindSpec::Temperature => ChannelState::Temperature {
                cur: 0.0,
                min: None,
                max: None,
                target: 0.0,
                preset: ClimatePreset::Safe,
                mode: ClimateMode::Run,
                sleep_timer: 0,
                precision: 0.5,
                thermostat: false,
            },
            ChannelKindSpec::SensorNumber => ChannelState::SensorNumber {
                value: 0.0,
                unit: None,
            },
            ChannelKindSpec::LightSensor => ChannelState::LightSensor { value: 0.0 },
            ChannelKindSpec::EdgeLit => ChannelState::EdgeLit,
            ChannelKindSpec::Memo => ChannelState::Memo,
            ChannelKindSpec::SelectedProgram => ChannelState::SelectedProgram {
                program: Program::None,
            },
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ChannelState::Relay { .. } => "Relay",
            ChannelState::Dimmer { .. } => "Dimmer",
            ChannelState::Blind { .. } => "Blind",
            ChannelState::Button { .. } => "Button",
            ChannelState::ButtonCounter { .. } => "ButtonCounter",
            ChannelState::Sensor { .. } => "Sensor",
            ChannelState::ThermostatChannel { .. } => "ThermostatChannel",
            ChannelState::Temperature { .. } => "Temperature",
            ChannelState::SensorNumber { .. } => "SensorNumber",
            ChannelState::LightSensor { .. } => "LightSensor",
            ChannelState::EdgeLit => "EdgeLit",
            ChannelState::Memo => "Memo",
            ChannelState::SelectedProgram { .. } => "SelectedProgram",
        }
    }
}

/// One logical endpoint of a module.
pub struct Channel {
    module_address: u8,
    module_type: u8,
    num: u8,
    name: NameState,
    default_name: String,
    editable: bool,
    /// Address and channel number to use for LED commands; differs from the
    /// primary address for banked panel buttons behind a sub-address.
    led_address: (u8, u8),
    state: ChannelState,
    callbacks: Vec<StatusCallback>,
    sender: FrameSender,
}

impl Channel {
    pub fn new(
        module_address: u8,
        module_type: u8,
        module_type_name: &str,
        num: u8,
        spec: &ChannelSpec,
        sender: FrameSender,
    ) -> Self {
        let mut name = NameState::new();
        if !spec.editable {
            // Fixed names never arrive over the bus.
            name.force(spec.name.clone());
        }
        Self {
            module_address,
            module_type,
            num,
            name,
            default_name: spec.name.clone(),
            editable: spec.editable,
            led_address: (module_address, num),
            state: ChannelState::for_kind(spec.kind, module_type_name),
            callbacks: Vec::new(),
            sender,
        }
    }

    /// Replacement channel used by the DALI scan when a device announces
    /// itself as a dimmable load.
    pub fn replace_state(&mut self, state: ChannelState) {
        self.state = state;
        self.notify();
    }

    pub fn get_channel_number(&self) -> u8 {
        self.num
    }

    pub fn get_module_address(&self) -> u8 {
        self.module_address
    }

    pub fn get_module_type(&self) -> u8 {
        self.module_type
    }

    pub fn get_name(&self) -> String {
        match &self.name {
            NameState::Complete(name) => name.clone(),
            _ => self.default_name.clone(),
        }
    }

    pub fn is_name_editable(&self) -> bool {
        self.editable
    }

    /// True once the name is final: immediately for fixed names, after
    /// assembly for editable ones.
    pub fn is_loaded(&self) -> bool {
        self.name.is_complete()
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn is_counter_channel(&self) -> bool {
        matches!(
            self.state,
            ChannelState::ButtonCounter { .. }
        )
    }

    pub fn is_temperature(&self) -> bool {
        matches!(self.state, ChannelState::Temperature { .. })
    }

    pub fn on_status_update(&mut self, callback: StatusCallback) {
        self.callbacks.push(callback);
    }

    pub(crate) fn set_led_route(&mut self, address: u8, channel: u8) {
        self.led_address = (address, channel);
    }

    pub(crate) fn name_mut(&mut self) -> &mut NameState {
        &mut self.name
    }

    /// Restore a cached name without waiting for the bus.
    pub(crate) fn set_cached_name(&mut self, name: String) {
        self.name.force(name);
    }

    fn notify(&self) {
        for callback in &self.callbacks {
            callback(self);
        }
    }

    pub fn get_categories(&self) -> Vec<Category> {
        match &self.state {
            ChannelState::Relay { enabled, .. } => {
                if *enabled {
                    vec![Category::Switch]
                } else {
                    vec![]
                }
            }
            ChannelState::Dimmer { .. } => vec![Category::Light],
            ChannelState::Blind { .. } => vec![Category::Cover],
            ChannelState::Button { enabled, .. } => {
                if *enabled {
                    vec![Category::BinarySensor, Category::Button, Category::Led]
                } else {
                    vec![]
                }
            }
            ChannelState::ButtonCounter { counter, .. } => {
                if *counter > 0 {
                    vec![Category::Sensor]
                } else {
                    vec![Category::BinarySensor]
                }
            }
            ChannelState::Sensor { .. } => vec![Category::BinarySensor],
            ChannelState::ThermostatChannel { .. } => vec![Category::BinarySensor],
            ChannelState::Temperature { thermostat, .. } => {
                if *thermostat {
                    vec![Category::Sensor, Category::Climate]
                } else {
                    vec![Category::Sensor]
                }
            }
            ChannelState::SensorNumber { .. } | ChannelState::LightSensor { .. } => {
                vec![Category::Sensor]
            }
            ChannelState::EdgeLit | ChannelState::Memo => vec![],
            ChannelState::SelectedProgram { .. } => vec![Category::Select],
        }
    }

    // ---- state mutation, called from the module dispatcher ----

    pub(crate) fn update_relay(&mut self, on: bool, inhibit: bool, forced_on: bool, disabled: bool) {
        if let ChannelState::Relay {
            on: s_on,
            inhibit: s_inhibit,
            forced_on: s_forced,
            disabled: s_disabled,
            ..
        } = &mut self.state
        {
            let changed = (*s_on, *s_inhibit, *s_forced, *s_disabled)
                != (on, inhibit, forced_on, disabled);
            *s_on = on;
            *s_inhibit = inhibit;
            *s_forced = forced_on;
            *s_disabled = disabled;
            if changed {
                self.notify();
            }
        }
    }

    pub(crate) fn update_dimmer_state(&mut self, value: u8) {
        if let ChannelState::Dimmer { state, .. } = &mut self.state {
            if *state != value {
                *state = value;
                self.notify();
            }
        }
    }

    pub(crate) fn update_blind(&mut self, new_state: BlindState, new_position: Option<u8>) {
        if let ChannelState::Blind { state, position, .. } = &mut self.state {
            let changed = *state != new_state || (new_position.is_some() && *position != new_position);
            *state = new_state;
            if new_position.is_some() {
                *position = new_position;
            }
            if changed {
                self.notify();
            }
        }
    }

    pub(crate) fn update_closed(&mut self, value: bool) {
        match &mut self.state {
            ChannelState::Button { closed, .. }
            | ChannelState::ButtonCounter { closed, .. }
            | ChannelState::Sensor { closed, .. } => {
                if *closed != value {
                    *closed = value;
                    self.notify();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn update_long_pressed(&mut self, value: bool) {
        if let ChannelState::Button { long, .. } = &mut self.state {
            if *long != value {
                *long = value;
                self.notify();
            }
        }
    }

    pub(crate) fn update_enabled(&mut self, value: bool) {
        match &mut self.state {
            ChannelState::Relay { enabled, .. }
            | ChannelState::Button { enabled, .. }
            | ChannelState::ButtonCounter { enabled, .. }
            | ChannelState::Sensor { enabled, .. } => {
                if *enabled != value {
                    *enabled = value;
                    self.notify();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn update_led_state(&mut self, value: LedState) {
        match &mut self.state {
            ChannelState::Button { led_state, .. }
            | ChannelState::ButtonCounter { led_state, .. } => {
                if *led_state != value {
                    *led_state = value;
                    self.notify();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn update_counter(&mut self, new_pulses: u32, new_counter: u32, new_delay: u16) {
        if let ChannelState::ButtonCounter {
            pulses,
            counter,
            delay,
            ..
        } = &mut self.state
        {
            let changed = (*pulses, *counter, *delay) != (new_pulses, new_counter, new_delay);
            *pulses = new_pulses;
            *counter = new_counter;
            *delay = new_delay;
            if changed {
                self.notify();
            }
        }
    }

    pub(crate) fn update_counter_unit(&mut self, new_unit: CounterUnit) {
        if let ChannelState::ButtonCounter { unit, .. } = &mut self.state {
            if *unit != Some(new_unit) {
                *unit = Some(new_unit);
                self.notify();
            }
        }
    }

    pub(crate) fn update_counter_pulses(&mut self, ppu: f64) {
        if let ChannelState::ButtonCounter {
            pulses_per_unit, ..
        } = &mut self.state
        {
            if *pulses_per_unit != ppu {
                *pulses_per_unit = ppu;
                self.notify();
            }
        }
    }

    pub fn get_pulses_per_unit(&self) -> f64 {
        match &self.state {
            ChannelState::ButtonCounter {
                pulses_per_unit, ..
            } => *pulses_per_unit,
            _ => 0.0,
        }
    }

    pub(crate) fn update_thermostat_output(&mut self, value: bool) {
        if let ChannelState::ThermostatChannel { active } = &mut self.state {
            if *active != value {
                *active = value;
                self.notify();
            }
        }
    }

    /// Reconcile the two temperature streams. The fine stream carries extra
    /// low bits the coarse thermostat status would otherwise erase: when a
    /// coarse update is exactly one coarse LSb below the truncated stored
    /// value, keep the stored extra bits, lowered by one fine LSb.
    pub fn maybe_update_temperature(&mut self, value: f64, new_precision: f64) {
        if let ChannelState::Temperature { cur, precision, .. } = &mut self.state {
            let truncated = (*cur / new_precision).floor() * new_precision;
            let mut value = value;
            if value == truncated {
                return;
            }
            if value == truncated - new_precision && *precision < new_precision {
                value = truncated - *precision;
            }
            *cur = value;
            *precision = new_precision;
            self.notify();
        }
    }

    pub(crate) fn update_min_max(&mut self, new_min: f64, new_max: f64) {
        if let ChannelState::Temperature { min, max, .. } = &mut self.state {
            *min = Some(new_min);
            *max = Some(new_max);
        }
    }

    pub(crate) fn update_climate(
        &mut self,
        new_preset: ClimatePreset,
        new_mode: ClimateMode,
        new_target: f64,
        new_sleep: u16,
    ) {
        if let ChannelState::Temperature {
            preset,
            mode,
            target,
            sleep_timer,
            thermostat,
            ..
        } = &mut self.state
        {
            let changed = (*preset, *mode, *target, *sleep_timer)
                != (new_preset, new_mode, new_target, new_sleep);
            *preset = new_preset;
            *mode = new_mode;
            *target = new_target;
            *sleep_timer = new_sleep;
            *thermostat = true;
            if changed {
                self.notify();
            }
        }
    }

    pub(crate) fn update_sensor_value(&mut self, new_value: f64, new_unit: Option<String>) {
        match &mut self.state {
            ChannelState::SensorNumber { value, unit } => {
                let changed = *value != new_value;
                *value = new_value;
                if new_unit.is_some() {
                    *unit = new_unit;
                }
                if changed {
                    self.notify();
                }
            }
            ChannelState::LightSensor { value } => {
                if *value != new_value {
                    *value = new_value;
                    self.notify();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn update_selected_program(&mut self, new_program: Program) {
        if let ChannelState::SelectedProgram { program } = &mut self.state {
            if *program != new_program {
                *program = new_program;
                self.notify();
            }
        }
    }

    // ---- state accessors ----

    pub fn is_on(&self) -> bool {
        match &self.state {
            ChannelState::Relay { on, .. } => *on,
            ChannelState::Dimmer { state, .. } => *state != 0,
            ChannelState::Button { led_state, .. } => *led_state == LedState::On,
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.state {
            ChannelState::Button { closed, .. }
            | ChannelState::ButtonCounter { closed, .. }
            | ChannelState::Sensor { closed, .. } => *closed,
            ChannelState::Blind { state, .. } => *state == BlindState::Down,
            _ => false,
        }
    }

    pub fn get_dimmer_state(&self) -> u8 {
        match &self.state {
            ChannelState::Dimmer { state, .. } => *state,
            _ => 0,
        }
    }

    pub fn get_position(&self) -> Option<u8> {
        match &self.state {
            ChannelState::Blind { position, .. } => *position,
            _ => None,
        }
    }

    pub fn get_blind_state(&self) -> Option<BlindState> {
        match &self.state {
            ChannelState::Blind { state, .. } => Some(*state),
            _ => None,
        }
    }

    pub fn get_led_state(&self) -> Option<LedState> {
        match &self.state {
            ChannelState::Button { led_state, .. }
            | ChannelState::ButtonCounter { led_state, .. } => Some(*led_state),
            _ => None,
        }
    }

    /// Current flow/power rate of a counter channel, 0.0 when the delay is
    /// the 0xFFFF "slower than measurable" sentinel.
    pub fn get_counter_rate(&self) -> f64 {
        if let ChannelState::ButtonCounter {
            pulses,
            delay,
            unit,
            ..
        } = &self.state
        {
            let Some(unit) = unit else { return 0.0 };
            if *delay == 0 || *delay == 0xFFFF || *pulses == 0 {
                return 0.0;
            }
            let scale = match unit {
                CounterUnit::KilowattHours => 1000.0,
                _ => 1.0,
            };
            let val = (1000.0 * 3600.0 * scale) / ((*delay as f64) * (*pulses as f64));
            (val * 100.0).round() / 100.0
        } else {
            0.0
        }
    }

    pub fn get_counter_state(&self) -> f64 {
        if let ChannelState::ButtonCounter {
            counter, pulses, ..
        } = &self.state
        {
            if *pulses == 0 {
                return 0.0;
            }
            ((*counter as f64 / *pulses as f64) * 100.0).round() / 100.0
        } else {
            0.0
        }
    }

    pub fn get_counter_unit(&self) -> Option<CounterUnit> {
        match &self.state {
            ChannelState::ButtonCounter { unit, .. } => *unit,
            _ => None,
        }
    }

    pub fn get_state(&self) -> f64 {
        match &self.state {
            ChannelState::Temperature { cur, .. } => (*cur * 100.0).round() / 100.0,
            ChannelState::SensorNumber { value, .. } | ChannelState::LightSensor { value } => {
                (*value * 100.0).round() / 100.0
            }
            ChannelState::Dimmer { state, .. } => *state as f64,
            _ => 0.0,
        }
    }

    pub fn get_unit(&self) -> Option<String> {
        match &self.state {
            ChannelState::Temperature { .. } => Some(TEMP_CELSIUS.to_string()),
            ChannelState::ButtonCounter { unit, .. } => unit.map(|u| u.as_str().to_string()),
            ChannelState::SensorNumber { unit, .. } => unit.clone(),
            _ => None,
        }
    }

    pub fn get_climate_mode(&self) -> Option<ClimateMode> {
        match &self.state {
            ChannelState::Temperature { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    pub fn get_climate_preset(&self) -> Option<ClimatePreset> {
        match &self.state {
            ChannelState::Temperature { preset, .. } => Some(*preset),
            _ => None,
        }
    }

    pub fn get_climate_target(&self) -> f64 {
        match &self.state {
            ChannelState::Temperature { target, .. } => *target,
            _ => 0.0,
        }
    }

    pub fn get_sleep_timer(&self) -> u16 {
        match &self.state {
            ChannelState::Temperature { sleep_timer, .. } => *sleep_timer,
            _ => 0,
        }
    }

    pub fn get_selected_program(&self) -> Option<Program> {
        match &self.state {
            ChannelState::SelectedProgram { program } => Some(*program),
            _ => None,
        }
    }

    // ---- operations: translate into outgoing messages ----

    pub fn turn_on(&self) {
        self.send(Message::SwitchRelayOn(SwitchRelayOn::new(vec![self.num])));
    }

    pub fn turn_off(&self) {
        self.send(Message::SwitchRelayOff(SwitchRelayOff::new(vec![self.num])));
    }

    pub fn set_dimmer_state(&self, value: u8, transition_time: u16) {
        let channel_mode = match &self.state {
            ChannelState::Dimmer {
                scale: DimmerScale::Dali,
                ..
            } => DimmerChannelMode::Raw,
            _ => DimmerChannelMode::Bitmask,
        };
        self.send(Message::SetDimmer(SetDimmer {
            channel_mode,
            channels: vec![self.num],
            state: value,
            transition_time,
        }));
    }

    pub fn restore_dimmer_state(&self, transition_time: u16) {
        self.send(Message::RestoreDimmer(RestoreDimmer {
            channels: vec![self.num],
            transition_time,
        }));
    }

    pub fn open(&self) {
        self.send(Message::CoverUp(self.cover_move::<CoverUp>()));
    }

    pub fn close(&self) {
        self.send(Message::CoverDown(self.cover_move::<CoverDown>()));
    }

    fn cover_move<T: CoverMoveNew>(&self) -> T {
        if self.blind_two_bit() {
            T::new_blind(self.num)
        } else {
            T::new(self.num)
        }
    }

    pub fn stop(&self) {
        let msg = if self.blind_two_bit() {
            CoverOff::new_blind(self.num)
        } else {
            CoverOff::new(self.num)
        };
        self.send(Message::CoverOff(msg));
    }

    pub fn set_position(&self, position: u8) {
        self.send(Message::CoverPosition(CoverPosition {
            channel: self.num,
            position,
        }));
    }

    fn blind_two_bit(&self) -> bool {
        matches!(self.state, ChannelState::Blind { two_bit: true, .. })
    }

    /// Drive the button LED; routed through the sub-address for banked
    /// panel buttons.
    pub fn set_led_state(&mut self, state: LedState) {
        let (address, channel) = self.led_address;
        let channels = vec![channel];
        let msg = match state {
            LedState::On => Message::SetLed(SetLed::new(channels)),
            LedState::Off => Message::ClearLed(ClearLed::new(channels)),
            LedState::Slow => Message::SlowBlinkingLed(SlowBlinkingLed::new(channels)),
            LedState::Fast => Message::FastBlinkingLed(FastBlinkingLed::new(channels)),
        };
        self.sender.send(address, &msg);
        self.update_led_state(state);
    }

    pub fn set_selected_program(&self, program: Program) {
        self.send(Message::SelectProgram(SelectProgram {
            program: program.into(),
        }));
    }

    /// Write the panel memo text, five characters per frame.
    pub fn set_memo_text(&self, text: &str) {
        let bytes: Vec<u8> = text.bytes().take(63).collect();
        let mut start = 0u8;
        for chunk in bytes.chunks(5) {
            self.send(Message::MemoText(MemoText {
                start,
                text: chunk.to_vec(),
            }));
            start += chunk.len() as u8;
        }
        // Terminate so shorter texts do not leave stale characters behind.
        self.send(Message::MemoText(MemoText {
            start,
            text: vec![0x00],
        }));
    }

    pub fn set_temp(&self, temp: f64) {
        self.send(Message::SetTemperature(SetTemperature {
            temp_type: 0x00,
            temp,
        }));
    }

    pub fn set_climate_preset(&self, preset: ClimatePreset) {
        self.send(Message::SwitchToPreset(SwitchToPreset {
            preset,
            sleep_timer: 0,
        }));
    }

    /// Set the thermostat operating mode. The sleep timer on the wire
    /// encodes the mode: 0x0000 run, 0xFFFF manual, minutes for sleep.
    pub fn set_climate_mode(&self, mode: ClimateMode, sleep_minutes: u16) {
        let sleep_timer = match mode {
            ClimateMode::Run => 0x0000,
            ClimateMode::Manual => 0xFFFF,
            ClimateMode::Sleep => sleep_minutes,
            _ => 0x0000,
        };
        let preset = match &self.state {
            ChannelState::Temperature { preset, .. } => *preset,
            _ => ClimatePreset::Safe,
        };
        self.send(Message::SwitchToPreset(SwitchToPreset {
            preset,
            sleep_timer,
        }));
    }

    /// Request this channel's name from the module, in the channel
    /// addressing its module family uses for name traffic.
    pub(crate) fn request_name(&self) {
        let request = if self.blind_two_bit() {
            ChannelNameRequest::for_blind(self.num)
        } else if matches!(
            self.state,
            ChannelState::Dimmer {
                scale: DimmerScale::Dali,
                ..
            }
        ) {
            ChannelNameRequest::for_raw_channel(self.num)
        } else {
            ChannelNameRequest::for_channel(self.num)
        };
        self.send(Message::ChannelNameRequest(request));
    }

    fn send(&self, msg: Message) {
        self.sender.send(self.module_address, &msg);
    }
}

trait CoverMoveNew {
    fn new(channel: u8) -> Self;
    fn new_blind(channel: u8) -> Self;
}

impl CoverMoveNew for CoverUp {
    fn new(channel: u8) -> Self {
        CoverUp::new(channel)
    }
    fn new_blind(channel: u8) -> Self {
        CoverUp::new_blind(channel)
    }
}

impl CoverMoveNew for CoverDown {
    fn new(channel: u8) -> Self {
        CoverDown::new(channel)
    }
    fn new_blind(channel: u8) -> Self {
        CoverDown::new_blind(channel)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("num", &self.num)
            .field("name", &self.get_name())
            .field("kind", &self.state.kind_name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
