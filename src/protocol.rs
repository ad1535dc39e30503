//! Static protocol description: which channels a module type has, which
//! memory addresses matter during load, and how its name replies are
//! indexed. Shipped as `moduleprotocol/protocol.json`, loaded once per
//! process and read-only afterwards.

use crate::error::VelbusError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Channel layout entry of one module type.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSpec {
    #[serde(rename = "Type")]
    pub kind: ChannelKindSpec,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Editable", default)]
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChannelKindSpec {
    Relay,
    Dimmer,
    Blind,
    Button,
    ButtonCounter,
    Sensor,
    ThermostatChannel,
    Temperature,
    SensorNumber,
    LightSensor,
    EdgeLit,
    Memo,
    SelectedProgram,
}

/// What to do with a memory byte that arrives for a known address.
#[derive(Debug, Clone, Deserialize)]
pub enum MemoryDirective {
    /// One character of the module name; the string is the byte position.
    /// A data byte of 0xFF commits the assembled name.
    ModuleName(String),
    /// Counter unit selector for a pulse-counting input: 0 = L/h,
    /// 1 = m³/h, 2 = kWh.
    CounterUnit { channel: u8 },
    /// Pulses-per-unit configuration: bits 0–5 in steps of 100, bits 6–7 a
    /// multiplier of ×1, ×2.5, ×0.05 or ×0.01.
    CounterPulses { channel: u8 },
}

#[derive(Debug, Clone, Deserialize)]
struct RawModuleSpec {
    #[serde(rename = "Type")]
    type_name: String,
    #[serde(rename = "Channels", default)]
    channels: BTreeMap<String, ChannelSpec>,
    #[serde(rename = "Memory", default)]
    memory: BTreeMap<String, MemoryDirective>,
    #[serde(rename = "NameMap", default)]
    name_map: HashMap<String, u8>,
    #[serde(rename = "AllChannelStatus", default)]
    all_channel_status: bool,
    #[serde(rename = "TemperatureChannel")]
    temperature_channel: Option<u8>,
    #[serde(rename = "Dali", default)]
    dali: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawProtocol {
    #[serde(rename = "ModuleTypes")]
    module_types: HashMap<String, RawModuleSpec>,
    #[serde(rename = "MessagesBroadCast", default)]
    broadcast: Vec<String>,
}

/// Channel layout and load hints for one module type.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub type_name: String,
    pub channels: BTreeMap<u8, ChannelSpec>,
    /// Memory address → directive, issued as ReadDataFromMemory during load.
    pub memory: BTreeMap<u16, MemoryDirective>,
    /// Remap of name-reply channel bytes that do not match a channel number.
    pub name_map: HashMap<u8, u8>,
    /// The module answers a single 0xFF channel-name request for all
    /// channels at once.
    pub all_channel_status: bool,
    /// Channel that receives thermostat temperature updates.
    pub temperature_channel: Option<u8>,
    /// DALI gateway: the channel list is discovered at runtime.
    pub dali: bool,
}

#[derive(Debug)]
pub struct ProtocolDescription {
    module_types: HashMap<u8, ModuleSpec>,
    broadcast_ignore: HashSet<u8>,
}

impl ProtocolDescription {
    /// The protocol description bundled with the library.
    pub fn bundled() -> Result<Self, VelbusError> {
        Self::from_json(include_str!("moduleprotocol/protocol.json"))
    }

    /// Load a protocol description from disk without blocking the runtime.
    pub async fn from_file(path: &Path) -> Result<Self, VelbusError> {
        let path = path.to_owned();
        let contents = tokio::task::spawn_blocking(move || std::fs::read_to_string(path))
            .await
            .map_err(|e| VelbusError::ProtocolFile(e.to_string()))??;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, VelbusError> {
        let raw: RawProtocol =
            serde_json::from_str(contents).map_err(|e| VelbusError::ProtocolFile(e.to_string()))?;

        let mut module_types = HashMap::new();
        for (key, spec) in raw.module_types {
            let mtype = parse_hex_byte(&key)?;
            let mut channels = BTreeMap::new();
            for (num, chan) in spec.channels {
                let num: u8 = num
                    .parse()
                    .map_err(|_| VelbusError::ProtocolFile(format!("bad channel number {num}")))?;
                channels.insert(num, chan);
            }
            let mut memory = BTreeMap::new();
            for (addr, directive) in spec.memory {
                let addr = u16::from_str_radix(&addr, 16).map_err(|_| {
                    VelbusError::ProtocolFile(format!("bad memory address {addr}"))
                })?;
                memory.insert(addr, directive);
            }
            let mut name_map = HashMap::new();
            for (from, to) in spec.name_map {
                name_map.insert(parse_hex_byte(&from)?, to);
            }
            module_types.insert(
                mtype,
                ModuleSpec {
                    type_name: spec.type_name,
                    channels,
                    memory,
                    name_map,
                    all_channel_status: spec.all_channel_status,
                    temperature_channel: spec.temperature_channel,
                    dali: spec.dali,
                },
            );
        }

        let mut broadcast_ignore = HashSet::new();
        for cmd in raw.broadcast {
            broadcast_ignore.insert(parse_hex_byte(&cmd)?);
        }

        Ok(Self {
            module_types,
            broadcast_ignore,
        })
    }

    pub fn module(&self, module_type: u8) -> Option<&ModuleSpec> {
        self.module_types.get(&module_type)
    }

    /// Commands to drop silently when another controller broadcasts them.
    pub fn is_broadcast_ignored(&self, command: u8) -> bool {
        self.broadcast_ignore.contains(&command)
    }
}

fn parse_hex_byte(s: &str) -> Result<u8, VelbusError> {
    u8::from_str_radix(s, 16)
        .map_err(|_| VelbusError::ProtocolFile(format!("bad hex byte {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_description_parses() {
        let protocol = ProtocolDescription::bundled().unwrap();
        let vmb1tc = protocol.module(0x0E).unwrap();
        assert_eq!(vmb1tc.type_name, "VMB1TC");
        assert!(!vmb1tc.memory.is_empty());
        let gpod = protocol.module(0x28).unwrap();
        assert!(gpod.all_channel_status);
        assert_eq!(gpod.temperature_channel, Some(33));
        assert!(protocol.module(0x45).unwrap().dali);
        assert!(protocol.is_broadcast_ignored(0xD8));
    }
}
