//! Commands sent to actuator and panel modules.

use super::sensor::ClimatePreset;
use super::{byte_to_channel, byte_to_channels, channels_to_byte, needs_data};
use crate::error::MessageError;

pub const CMD_SWITCH_RELAY_OFF: u8 = 0x01;
pub const CMD_SWITCH_RELAY_ON: u8 = 0x02;
pub const CMD_COVER_OFF: u8 = 0x04;
pub const CMD_COVER_UP: u8 = 0x05;
pub const CMD_COVER_DOWN: u8 = 0x06;
pub const CMD_SET_DIMMER: u8 = 0x07;
pub const CMD_RESTORE_DIMMER: u8 = 0x11;
pub const CMD_COVER_POSITION: u8 = 0x1C;
pub const CMD_MEMO_TEXT: u8 = 0xAC;
pub const CMD_SELECT_PROGRAM: u8 = 0xB3;
pub const CMD_SWITCH_TO_COMFORT: u8 = 0xDB;
pub const CMD_SWITCH_TO_DAY: u8 = 0xDC;
pub const CMD_SWITCH_TO_NIGHT: u8 = 0xDD;
pub const CMD_SWITCH_TO_SAFE: u8 = 0xDE;
pub const CMD_SET_COOLING_MODE: u8 = 0xDF;
pub const CMD_SET_HEATING_MODE: u8 = 0xE0;
pub const CMD_SET_TEMPERATURE: u8 = 0xE4;
pub const CMD_CLEAR_LED: u8 = 0xF5;
pub const CMD_SET_LED: u8 = 0xF6;
pub const CMD_SLOW_BLINKING_LED: u8 = 0xF7;
pub const CMD_FAST_BLINKING_LED: u8 = 0xF8;

macro_rules! channel_bitmap_message {
    ($(#[$doc:meta])* $name:ident, $cmd:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub channels: Vec<u8>,
        }

        impl $name {
            pub fn new(channels: Vec<u8>) -> Self {
                Self { channels }
            }

            pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
                needs_data(data, 1)?;
                Ok(Self {
                    channels: byte_to_channels(data[0]),
                })
            }

            pub fn encode_data(&self) -> Vec<u8> {
                vec![$cmd, channels_to_byte(&self.channels)]
            }
        }
    };
}

channel_bitmap_message!(
    /// Energize the given relay channels.
    SwitchRelayOn,
    CMD_SWITCH_RELAY_ON
);
channel_bitmap_message!(
    /// Release the given relay channels.
    SwitchRelayOff,
    CMD_SWITCH_RELAY_OFF
);
channel_bitmap_message!(SetLed, CMD_SET_LED);
channel_bitmap_message!(ClearLed, CMD_CLEAR_LED);
channel_bitmap_message!(SlowBlinkingLed, CMD_SLOW_BLINKING_LED);
channel_bitmap_message!(FastBlinkingLed, CMD_FAST_BLINKING_LED);

/// How a dimmer command addresses its channels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimmerChannelMode {
    /// Bit i ⇔ channel i+1 (VMB4DC, VMB1DM, VMBDME).
    Bitmask,
    /// The raw channel number (VMBDALI, VMBDMI).
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDimmer {
    pub channel_mode: DimmerChannelMode,
    pub channels: Vec<u8>,
    pub state: u8,
    /// Transition time in seconds.
    pub transition_time: u16,
}

impl SetDimmer {
    pub fn decode(channel_mode: DimmerChannelMode, data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 4)?;
        let channels = match channel_mode {
            DimmerChannelMode::Bitmask => byte_to_channels(data[0]),
            DimmerChannelMode::Raw => vec![data[0]],
        };
        Ok(Self {
            channel_mode,
            channels,
            state: data[1],
            transition_time: u16::from_be_bytes([data[2], data[3]]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let channel_byte = match self.channel_mode {
            DimmerChannelMode::Bitmask => channels_to_byte(&self.channels),
            DimmerChannelMode::Raw => self.channels.first().copied().unwrap_or(0),
        };
        let transition = self.transition_time.to_be_bytes();
        vec![
            CMD_SET_DIMMER,
            channel_byte,
            self.state,
            transition[0],
            transition[1],
        ]
    }
}

/// Bring dimmer channels back to their last non-zero level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreDimmer {
    pub channels: Vec<u8>,
    pub transition_time: u16,
}

impl RestoreDimmer {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        Ok(Self {
            channels: byte_to_channels(data[0]),
            transition_time: u16::from_be_bytes([data[1], data[2]]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let transition = self.transition_time.to_be_bytes();
        vec![
            CMD_RESTORE_DIMMER,
            channels_to_byte(&self.channels),
            transition[0],
            transition[1],
        ]
    }
}

macro_rules! cover_move_message {
    ($(#[$doc:meta])* $name:ident, $cmd:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub channel: u8,
            /// Motor run time in seconds; 0 keeps the configured default.
            pub timeout: u8,
            /// Use the VMB1BL/VMB2BL two-bit channel mask.
            pub blind_encoding: bool,
        }

        impl $name {
            pub fn new(channel: u8) -> Self {
                Self {
                    channel,
                    timeout: 0,
                    blind_encoding: false,
                }
            }

            pub fn new_blind(channel: u8) -> Self {
                Self {
                    channel,
                    timeout: 0,
                    blind_encoding: true,
                }
            }

            pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
                needs_data(data, 1)?;
                Ok(Self {
                    channel: byte_to_channel(data[0])?,
                    timeout: data.get(1).copied().unwrap_or(0),
                    blind_encoding: false,
                })
            }

            pub fn decode_blind(data: &[u8]) -> Result<Self, MessageError> {
                needs_data(data, 1)?;
                Ok(Self {
                    channel: byte_to_channel((data[0] >> 1) & 0x03)?,
                    timeout: data.get(1).copied().unwrap_or(0),
                    blind_encoding: true,
                })
            }

            fn channel_byte(&self) -> u8 {
                if self.blind_encoding {
                    if self.channel == 1 { 0x03 } else { 0x0C }
                } else {
                    channels_to_byte(&[self.channel])
                }
            }

            pub fn encode_data(&self) -> Vec<u8> {
                vec![$cmd, self.channel_byte(), self.timeout]
            }
        }
    };
}

cover_move_message!(
    /// Start moving a blind up.
    CoverUp,
    CMD_COVER_UP
);
cover_move_message!(
    /// Start moving a blind down.
    CoverDown,
    CMD_COVER_DOWN
);

/// Stop a moving blind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverOff {
    pub channel: u8,
    pub blind_encoding: bool,
}

impl CoverOff {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            blind_encoding: false,
        }
    }

    pub fn new_blind(channel: u8) -> Self {
        Self {
            channel,
            blind_encoding: true,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 1)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            blind_encoding: false,
        })
    }

    pub fn decode_blind(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 1)?;
        Ok(Self {
            channel: byte_to_channel((data[0] >> 1) & 0x03)?,
            blind_encoding: true,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let channel_byte = if self.blind_encoding {
            if self.channel == 1 { 0x03 } else { 0x0C }
        } else {
            channels_to_byte(&[self.channel])
        };
        vec![CMD_COVER_OFF, channel_byte]
    }
}

/// Drive a position-aware blind to an absolute position (0 = open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverPosition {
    pub channel: u8,
    pub position: u8,
}

impl CoverPosition {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            position: data[1],
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_COVER_POSITION,
            channels_to_byte(&[self.channel]),
            self.position,
        ]
    }
}

/// Select the active program of an input panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectProgram {
    pub program: u8,
}

impl SelectProgram {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 1)?;
        Ok(Self {
            program: data[0] & 0x03,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![CMD_SELECT_PROGRAM, self.program]
    }
}

/// One five-character slice of the scrolling memo text on OLED panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoText {
    pub start: u8,
    pub text: Vec<u8>,
}

impl MemoText {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        Ok(Self {
            start: data[1],
            text: data[2..].to_vec(),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![CMD_MEMO_TEXT, 0x00, self.start];
        data.extend_from_slice(&self.text);
        while data.len() < 8 {
            data.push(0x00);
        }
        data
    }
}

/// Set a thermostat target temperature, half-degree steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SetTemperature {
    pub temp_type: u8,
    pub temp: f64,
}

impl SetTemperature {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        Ok(Self {
            temp_type: data[0],
            temp: data[1] as f64 / 2.0,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_SET_TEMPERATURE,
            self.temp_type,
            (self.temp * 2.0) as u8,
        ]
    }
}

/// Switch a thermostat to one of its presets, with the sleep timer that
/// encodes the operating mode: 0x0000 = run, 0xFFFF = manual, anything else
/// = sleep minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchToPreset {
    pub preset: ClimatePreset,
    pub sleep_timer: u16,
}

impl SwitchToPreset {
    pub fn decode(preset: ClimatePreset, data: &[u8]) -> Result<Self, MessageError> {
        let sleep_timer = if data.len() >= 2 {
            u16::from_be_bytes([data[0], data[1]])
        } else {
            0
        };
        Ok(Self { preset, sleep_timer })
    }

    pub fn command(&self) -> u8 {
        match self.preset {
            ClimatePreset::Comfort => CMD_SWITCH_TO_COMFORT,
            ClimatePreset::Day => CMD_SWITCH_TO_DAY,
            ClimatePreset::Night => CMD_SWITCH_TO_NIGHT,
            _ => CMD_SWITCH_TO_SAFE,
        }
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let sleep = self.sleep_timer.to_be_bytes();
        vec![self.command(), sleep[0], sleep[1]]
    }
}

/// Put the thermostat into cooling season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetCoolingMode;

impl SetCoolingMode {
    pub fn encode_data(&self) -> Vec<u8> {
        vec![CMD_SET_COOLING_MODE]
    }
}

/// Put the thermostat into heating season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetHeatingMode;

impl SetHeatingMode {
    pub fn encode_data(&self) -> Vec<u8> {
        vec![CMD_SET_HEATING_MODE]
    }
}
