//! Mapping from `(command byte, module type)` to a typed message decoder.
//!
//! Most commands decode the same way everywhere; a handful change their
//! layout per module family (module status, channel names, blind control).
//! Those register per-module overrides which win over the default entry.
//! Registration runs once at process startup and duplicate registrations
//! panic: two decoders for the same slot is a programmer error.

use crate::messages::MessageKind;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Published module-type table: type byte → commercial name.
pub static MODULE_DIRECTORY: LazyLock<HashMap<u8, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (0x01, "VMB8PB"),
        (0x02, "VMB1RY"),
        (0x03, "VMB1BL"),
        (0x04, "VMB4LEDPWM-20"),
        (0x05, "VMB6IN"),
        (0x07, "VMB1DM"),
        (0x08, "VMB4RY"),
        (0x09, "VMB2BL"),
        (0x0A, "VMB8IR"),
        (0x0B, "VMB4PD"),
        (0x0C, "VMB1TS"),
        (0x0D, "VMB1TH"),
        (0x0E, "VMB1TC"),
        (0x0F, "VMB1LED"),
        (0x10, "VMB4RYLD"),
        (0x11, "VMB4RYNO"),
        (0x12, "VMB4DC"),
        (0x13, "VMBLCDWB"),
        (0x14, "VMBDME"),
        (0x15, "VMBDMI"),
        (0x16, "VMB8PBU"),
        (0x17, "VMB6PBN"),
        (0x18, "VMB2PBN"),
        (0x19, "VMB6PBB"),
        (0x1A, "VMB4RF"),
        (0x1B, "VMB1RYNO"),
        (0x1C, "VMB1BLE"),
        (0x1D, "VMB2BLE"),
        (0x1E, "VMBGP1"),
        (0x1F, "VMBGP2"),
        (0x20, "VMBGP4"),
        (0x21, "VMBGPO"),
        (0x22, "VMB7IN"),
        (0x28, "VMBGPOD"),
        (0x29, "VMB1RYNOS"),
        (0x2A, "VMBPIRM"),
        (0x2B, "VMBPIRC"),
        (0x2C, "VMBPIRO"),
        (0x2D, "VMBGP4PIR"),
        (0x2E, "VMB1BLS"),
        (0x2F, "VMBDMI-R"),
        (0x31, "VMBMETEO"),
        (0x32, "VMB4AN"),
        (0x33, "VMBVP01"),
        (0x34, "VMBEL1"),
        (0x35, "VMBEL2"),
        (0x36, "VMBEL4"),
        (0x37, "VMBELO"),
        (0x38, "VMBELPIR"),
        (0x39, "VMBSIG"),
        (0x3A, "VMBGP1-2"),
        (0x3B, "VMBGP2-2"),
        (0x3C, "VMBGP4-2"),
        (0x3D, "VMBGPOD-2"),
        (0x3E, "VMBGP4PIR-2"),
        (0x3F, "VMCM3"),
        (0x40, "VMBUSBIP"),
        (0x41, "VMB1RYS"),
        (0x42, "VMBKP"),
        (0x43, "VMBIN"),
        (0x44, "VMB4PB"),
        (0x45, "VMBDALI"),
        (0x48, "VMB4RYLD-10"),
        (0x49, "VMB4RYNO-10"),
        (0x4A, "VMB2BLE-10"),
        (0x4B, "VMB8DC-20"),
        (0x4C, "VMB6PB-20"),
        (0x4F, "VMBEL1-20"),
        (0x50, "VMBEL2-20"),
        (0x51, "VMBEL4-20"),
        (0x52, "VMBELO-20"),
        (0x53, "VMBGP1-20"),
        (0x54, "VMBGP2-20"),
        (0x55, "VMBGP4-20"),
        (0x56, "VMBGPO-20"),
        (0x5A, "VMBDALI-20"),
        (0x5C, "VMBEL4PIR-20"),
        (0x5F, "VMBGP4PIR-20"),
    ])
});

pub fn module_type_name(module_type: u8) -> &'static str {
    MODULE_DIRECTORY.get(&module_type).copied().unwrap_or("Unknown")
}

pub struct CommandRegistry {
    defaults: HashMap<u8, MessageKind>,
    overrides: HashMap<u8, HashMap<u8, MessageKind>>,
}

impl CommandRegistry {
    fn new() -> Self {
        Self {
            defaults: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    fn register_default(&mut self, command: u8, kind: MessageKind) {
        if let Some(existing) = self.defaults.insert(command, kind) {
            panic!(
                "double registration in command registry: {command:#04x} already bound to {existing:?}"
            );
        }
    }

    fn register_override(&mut self, command: u8, kind: MessageKind, module_name: &str) {
        let module_type = MODULE_DIRECTORY
            .iter()
            .find(|(_, name)| **name == module_name)
            .map(|(mtype, _)| *mtype)
            .unwrap_or_else(|| panic!("module name {module_name} not known"));
        let slot = self.overrides.entry(module_type).or_default();
        if let Some(existing) = slot.insert(command, kind) {
            panic!(
                "double registration in command registry: {command:#04x}/{module_name} already bound to {existing:?}"
            );
        }
    }

    /// Lookup order: override for the module type, then the default.
    pub fn get(&self, command: u8, module_type: u8) -> Option<MessageKind> {
        self.overrides
            .get(&module_type)
            .and_then(|slot| slot.get(&command))
            .or_else(|| self.defaults.get(&command))
            .copied()
    }

    pub fn has(&self, command: u8, module_type: u8) -> bool {
        self.get(command, module_type).is_some()
    }
}

/// Process-wide registry, built once and read-only afterwards.
pub static COMMAND_REGISTRY: LazyLock<CommandRegistry> = LazyLock::new(build_registry);

const PANEL_MODULES: &[&str] = &[
    "VMBGP1", "VMBEL1", "VMBGP1-2", "VMBGP2", "VMBEL2", "VMBGP2-2", "VMBGP4", "VMBEL4",
    "VMBGP4-2", "VMBGPO", "VMBGPOD", "VMBGPOD-2", "VMBELO", "VMBGP4PIR", "VMBGP4PIR-2",
    "VMBELPIR", "VMBDALI", "VMB4AN", "VMBEL1-20", "VMBEL2-20", "VMBEL4-20", "VMBELO-20",
    "VMBGP1-20", "VMBGP2-20", "VMBGP4-20", "VMBGPO-20", "VMBDALI-20", "VMBEL4PIR-20",
    "VMBGP4PIR-20", "VMB4LEDPWM-20", "VMB8DC-20", "VMB6PB-20", "VMBDMI", "VMBDMI-R",
];

const STATUS2_MODULES: &[&str] = &[
    "VMB8PBU", "VMB6PBN", "VMB2PBN", "VMB6PBB", "VMBGP1", "VMBEL1", "VMBGP1-2", "VMBGP2",
    "VMBEL2", "VMBGP2-2", "VMBGP4", "VMBEL4", "VMBGP4-2", "VMBGPO", "VMBGPOD", "VMBGPOD-2",
    "VMBELO", "VMB7IN", "VMB4DC", "VMBDMI", "VMBDMI-R", "VMBDME", "VMB1RYS", "VMB6PB-20",
    "VMBGP1-20", "VMBGP2-20", "VMBGP4-20", "VMBGPO-20",
];

const OLD_BLIND_MODULES: &[&str] = &["VMB1BL", "VMB2BL"];

fn build_registry() -> CommandRegistry {
    use MessageKind::*;

    let mut registry = CommandRegistry::new();

    // Identification.
    registry.register_default(0xFF, ModuleType);
    registry.register_default(0xB0, ModuleSubType);
    registry.register_default(0xA7, ModuleSubTypeBank4);
    registry.register_default(0xA6, ModuleSubTypeBank8);

    // Load requests.
    registry.register_default(0xFA, ModuleStatusRequest);
    registry.register_default(0xEF, ChannelNameRequest);
    registry.register_default(0xFD, ReadDataFromMemory);
    registry.register_default(0xC9, ReadDataBlockFromMemory);
    for module in OLD_BLIND_MODULES {
        registry.register_override(0xEF, ChannelNameRequestBlind, module);
    }
    registry.register_override(0xBD, CounterStatusRequest, "VMB7IN");

    // Status reports.
    registry.register_default(0x00, PushButtonStatus);
    registry.register_default(0xFB, RelayStatus);
    for module in ["VMB4DC", "VMBDMI", "VMBDMI-R", "VMB8DC-20"] {
        registry.register_override(0xB8, DimmerChannelStatus, module);
    }
    for module in ["VMB1DM", "VMBDME", "VMB1LED"] {
        registry.register_override(0xEE, DimmerStatus, module);
    }
    for module in ["VMBDME", "VMB4DC", "VMBDMI", "VMBDMI-R", "VMB1LED"] {
        registry.register_override(0x0F, SliderStatus, module);
    }
    for module in ["VMB1BLE", "VMB2BLE", "VMB1BLS", "VMB2BLE-10"] {
        registry.register_override(0xEC, BlindStatusNg, module);
    }
    for module in OLD_BLIND_MODULES {
        registry.register_override(0xEC, BlindStatus, module);
    }
    registry.register_default(0xED, ModuleStatus);
    for module in STATUS2_MODULES {
        registry.register_override(0xED, ModuleStatus2, module);
    }
    for module in ["VMBPIRM", "VMBPIRC", "VMBPIRO", "VMBELPIR"] {
        registry.register_override(0xED, ModuleStatusPir, module);
    }
    for module in ["VMBGP4PIR", "VMBGP4PIR-2", "VMBGP4PIR-20", "VMBEL4PIR-20"] {
        registry.register_override(0xED, ModuleStatusGp4Pir, module);
    }
    registry.register_override(0xBE, CounterStatus, "VMB7IN");
    registry.register_default(0xF4, UpdateLedStatus);

    // Sensors.
    registry.register_default(0xE6, SensorTemperature);
    registry.register_default(0xEA, TempSensorStatus);
    registry.register_override(0xA9, MeteoRaw, "VMBMETEO");
    registry.register_override(0xA9, SensorRaw, "VMB4AN");

    // Names and memory. Panels index name replies by raw channel byte, the
    // first blind generation by a two-bit field, everything else by bit.
    registry.register_default(0xF0, ChannelNamePart1);
    registry.register_default(0xF1, ChannelNamePart2);
    registry.register_default(0xF2, ChannelNamePart3);
    for module in PANEL_MODULES {
        registry.register_override(0xF0, ChannelNamePart1Indexed, module);
        registry.register_override(0xF1, ChannelNamePart2Indexed, module);
        registry.register_override(0xF2, ChannelNamePart3Indexed, module);
    }
    for module in OLD_BLIND_MODULES {
        registry.register_override(0xF0, ChannelNamePart1Blind, module);
        registry.register_override(0xF1, ChannelNamePart2Blind, module);
        registry.register_override(0xF2, ChannelNamePart3Blind, module);
    }
    registry.register_default(0xFE, MemoryData);
    registry.register_default(0xCC, MemoryDataBlock);

    // Commands. Registered so that bus traffic from other controllers and
    // panels is understood, not only our own transmissions.
    registry.register_default(0x02, SwitchRelayOn);
    registry.register_default(0x01, SwitchRelayOff);
    for module in ["VMB1DM", "VMBDME", "VMB4DC", "VMB1LED"] {
        registry.register_override(0x07, SetDimmer, module);
    }
    for module in ["VMBDALI", "VMBDALI-20", "VMBDMI", "VMBDMI-R", "VMB8DC-20"] {
        registry.register_override(0x07, SetDimmerDali, module);
    }
    registry.register_default(0x11, RestoreDimmer);
    registry.register_default(0x05, CoverUp);
    registry.register_default(0x06, CoverDown);
    registry.register_default(0x04, CoverOff);
    registry.register_default(0x1C, CoverPosition);
    for module in OLD_BLIND_MODULES {
        registry.register_override(0x05, CoverUpBlind, module);
        registry.register_override(0x06, CoverDownBlind, module);
        registry.register_override(0x04, CoverOffBlind, module);
    }
    registry.register_default(0xF6, SetLed);
    registry.register_default(0xF5, ClearLed);
    registry.register_default(0xF7, SlowBlinkingLed);
    registry.register_default(0xF8, FastBlinkingLed);
    registry.register_default(0xB3, SelectProgram);
    registry.register_default(0xAC, MemoText);
    registry.register_default(0xE4, SetTemperature);
    registry.register_default(0xDB, SwitchToComfort);
    registry.register_default(0xDC, SwitchToDay);
    registry.register_default(0xDD, SwitchToNight);
    registry.register_default(0xDE, SwitchToSafe);
    registry.register_default(0xDF, SetCoolingMode);
    registry.register_default(0xE0, SetHeatingMode);

    // Clock broadcasts.
    registry.register_default(0xD8, SetRealtimeClock);
    registry.register_default(0xB7, SetDate);
    registry.register_default(0xAF, SetDaylightSaving);

    // DALI.
    for module in ["VMBDALI", "VMBDALI-20"] {
        registry.register_override(0xE7, DaliDeviceSettingsRequest, module);
        registry.register_override(0xE8, DaliDeviceSettings, module);
        registry.register_override(0xA5, DimValueStatus, module);
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_default() {
        let vmb7in = 0x22;
        let vmb4ryld = 0x10;
        assert_eq!(
            COMMAND_REGISTRY.get(0xED, vmb7in),
            Some(MessageKind::ModuleStatus2)
        );
        assert_eq!(
            COMMAND_REGISTRY.get(0xED, vmb4ryld),
            Some(MessageKind::ModuleStatus)
        );
    }

    #[test]
    fn unknown_command_has_no_entry() {
        assert!(!COMMAND_REGISTRY.has(0x99, 0x10));
    }

    #[test]
    #[should_panic(expected = "double registration")]
    fn duplicate_default_registration_panics() {
        let mut registry = CommandRegistry::new();
        registry.register_default(0xFB, MessageKind::RelayStatus);
        registry.register_default(0xFB, MessageKind::RelayStatus);
    }
}
