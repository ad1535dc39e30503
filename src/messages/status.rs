//! Unsolicited status reports from actuator and input modules.

use super::{byte_to_channel, byte_to_channels, channels_to_byte, needs_data};
use crate::error::MessageError;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

pub const CMD_PUSH_BUTTON_STATUS: u8 = 0x00;
pub const CMD_RELAY_STATUS: u8 = 0xFB;
pub const CMD_DIMMER_CHANNEL_STATUS: u8 = 0xB8;
pub const CMD_DIMMER_STATUS: u8 = 0xEE;
pub const CMD_SLIDER_STATUS: u8 = 0x0F;
pub const CMD_BLIND_STATUS: u8 = 0xEC;
pub const CMD_MODULE_STATUS: u8 = 0xED;
pub const CMD_COUNTER_STATUS: u8 = 0xBE;
pub const CMD_UPDATE_LED_STATUS: u8 = 0xF4;

/// Channel override state carried by relay and dimmer status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OverrideState {
    Normal = 0x00,
    Inhibited = 0x01,
    ForcedOn = 0x02,
    Disabled = 0x03,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Default for OverrideState {
    fn default() -> Self {
        OverrideState::Normal
    }
}

/// Button edges: which channels just closed, just opened, and which are
/// held long enough for a long-press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushButtonStatus {
    pub closed: Vec<u8>,
    pub opened: Vec<u8>,
    pub closed_long: Vec<u8>,
}

impl PushButtonStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        Ok(Self {
            closed: byte_to_channels(data[0]),
            opened: byte_to_channels(data[1]),
            closed_long: byte_to_channels(data[2]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_PUSH_BUTTON_STATUS,
            channels_to_byte(&self.closed),
            channels_to_byte(&self.opened),
            channels_to_byte(&self.closed_long),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    pub channel: u8,
    pub override_state: OverrideState,
    pub status: u8,
    pub led_status: u8,
    pub delay_time: u32,
}

pub const RELAY_ON: u8 = 0x01;
pub const RELAY_INTERVAL_TIMER_ON: u8 = 0x03;

impl RelayStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 7)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            override_state: OverrideState::from_primitive(data[1]),
            status: data[2],
            led_status: data[3],
            delay_time: u32::from_be_bytes([0, data[4], data[5], data[6]]),
        })
    }

    pub fn is_on(&self) -> bool {
        self.status == RELAY_ON || self.status == RELAY_INTERVAL_TIMER_ON
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let delay = self.delay_time.to_be_bytes();
        vec![
            CMD_RELAY_STATUS,
            channels_to_byte(&[self.channel]),
            self.override_state.into(),
            self.status,
            self.led_status,
            delay[1],
            delay[2],
            delay[3],
        ]
    }
}

/// Per-channel dimmer status from multi-channel dimmers (VMB4DC, VMBDMI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimmerChannelStatus {
    pub channel: u8,
    pub override_state: OverrideState,
    pub state: u8,
    pub led_status: u8,
}

impl DimmerChannelStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 4)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            override_state: OverrideState::from_primitive(data[1]),
            state: data[2],
            led_status: data[3],
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_DIMMER_CHANNEL_STATUS,
            channels_to_byte(&[self.channel]),
            self.override_state.into(),
            self.state,
            self.led_status,
        ]
    }
}

/// Whole-module status from single-channel dimmers (VMB1DM, VMBDME).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimmerStatus {
    pub mode: u8,
    pub state: u8,
    pub led_status: u8,
    pub delay_time: u32,
}

impl DimmerStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 6)?;
        Ok(Self {
            mode: data[0],
            state: data[1],
            led_status: data[2],
            delay_time: u32::from_be_bytes([0, data[3], data[4], data[5]]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let delay = self.delay_time.to_be_bytes();
        vec![
            CMD_DIMMER_STATUS,
            self.mode,
            self.state,
            self.led_status,
            delay[1],
            delay[2],
            delay[3],
        ]
    }
}

/// Slider position echo from dimmer front panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliderStatus {
    pub channel: u8,
    pub state: u8,
    pub long_pressed: u8,
}

impl SliderStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            state: data[1],
            long_pressed: data[2],
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_SLIDER_STATUS,
            channels_to_byte(&[self.channel]),
            self.state,
            self.long_pressed,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BlindState {
    #[strum(to_string = "stopped")]
    Stopped = 0x00,
    #[strum(to_string = "up")]
    Up = 0x01,
    #[strum(to_string = "down")]
    Down = 0x02,
    #[num_enum(catch_all)]
    #[strum(to_string = "unknown")]
    Unknown(u8),
}

impl Default for BlindState {
    fn default() -> Self {
        BlindState::Stopped
    }
}

/// Blind status of the first-generation VMB1BL/VMB2BL: two bits per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindStatus {
    pub channel: u8,
    pub timeout: u8,
    pub state: BlindState,
}

impl BlindStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        let channel = byte_to_channel((data[0] >> 1) & 0x03)?;
        let state = (data[2] >> ((channel - 1) * 2)) & 0x03;
        Ok(Self {
            channel,
            timeout: data[1],
            state: BlindState::from_primitive(state),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let chan_bits = if self.channel == 1 { 0x03 } else { 0x0C };
        let state: u8 = self.state.into();
        vec![
            CMD_BLIND_STATUS,
            chan_bits,
            self.timeout,
            state << ((self.channel - 1) * 2),
        ]
    }
}

/// Blind status of the newer VMB1BLE/VMB2BLE family, with position feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindStatusNg {
    pub channel: u8,
    pub timeout: u8,
    pub state: BlindState,
    pub led_status: u8,
    pub position: u8,
}

impl BlindStatusNg {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 7)?;
        Ok(Self {
            channel: byte_to_channel(data[0])?,
            timeout: data[1],
            state: BlindState::from_primitive(data[2]),
            led_status: data[3],
            position: data[4],
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_BLIND_STATUS,
            channels_to_byte(&[self.channel]),
            self.timeout,
            self.state.into(),
            self.led_status,
            self.position,
            0x00,
            0x00,
        ]
    }
}

/// Bulk input status of first-generation input modules (VMB6IN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub closed: Vec<u8>,
    pub led_on: Vec<u8>,
    pub led_slow_blinking: Vec<u8>,
    pub led_fast_blinking: Vec<u8>,
}

impl ModuleStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 4)?;
        Ok(Self {
            closed: byte_to_channels(data[0]),
            led_on: byte_to_channels(data[1]),
            led_slow_blinking: byte_to_channels(data[2]),
            led_fast_blinking: byte_to_channels(data[3]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_MODULE_STATUS,
            channels_to_byte(&self.closed),
            channels_to_byte(&self.led_on),
            channels_to_byte(&self.led_slow_blinking),
            channels_to_byte(&self.led_fast_blinking),
        ]
    }
}

/// Bulk input status of the glass-panel generation, including the active
/// program selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus2 {
    pub closed: Vec<u8>,
    pub enabled: Vec<u8>,
    pub normal: Vec<u8>,
    pub locked: Vec<u8>,
    pub program_enabled: Vec<u8>,
    pub selected_program: u8,
}

impl ModuleStatus2 {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 6)?;
        Ok(Self {
            closed: byte_to_channels(data[0]),
            enabled: byte_to_channels(data[1]),
            normal: byte_to_channels(data[2]),
            locked: byte_to_channels(data[3]),
            program_enabled: byte_to_channels(data[4]),
            selected_program: data[5] & 0x03,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_MODULE_STATUS,
            channels_to_byte(&self.closed),
            channels_to_byte(&self.enabled),
            channels_to_byte(&self.normal),
            channels_to_byte(&self.locked),
            channels_to_byte(&self.program_enabled),
            self.selected_program,
        ]
    }
}

/// Motion/light status of the PIR family. The raw bit positions map to the
/// synthetic sensor channels 1..8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatusPir {
    pub dark: bool,
    pub light: bool,
    pub motion1: bool,
    pub light_motion1: bool,
    pub motion2: bool,
    pub light_motion2: bool,
    pub low_temp_alarm: bool,
    pub high_temp_alarm: bool,
    pub light_value: u16,
    pub selected_program: u8,
}

impl ModuleStatusPir {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 6)?;
        Ok(Self {
            dark: data[0] & (1 << 0) != 0,
            light: data[0] & (1 << 1) != 0,
            motion1: data[0] & (1 << 2) != 0,
            light_motion1: data[0] & (1 << 3) != 0,
            motion2: data[0] & (1 << 4) != 0,
            light_motion2: data[0] & (1 << 5) != 0,
            low_temp_alarm: data[0] & (1 << 6) != 0,
            high_temp_alarm: data[0] & (1 << 7) != 0,
            light_value: ((data[1] as u16) << 8) | data[2] as u16,
            selected_program: data[5] & 0x03,
        })
    }

    /// Channel bits in the layout order of `closed` channels 1..8.
    pub fn channel_bits(&self) -> [bool; 8] {
        [
            self.dark,
            self.light,
            self.motion1,
            self.light_motion1,
            self.motion2,
            self.light_motion2,
            self.low_temp_alarm,
            self.high_temp_alarm,
        ]
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let bits = self
            .channel_bits()
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, b)| if *b { acc | 1 << i } else { acc });
        vec![
            CMD_MODULE_STATUS,
            bits,
            (self.light_value >> 8) as u8,
            (self.light_value & 0xFF) as u8,
            0x00,
            0x00,
            self.selected_program,
        ]
    }
}

/// Input status of the VMBGP4PIR: button bits plus a 10-bit light value
/// packed into the high nibble of DB2 and DB3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatusGp4Pir {
    pub closed: Vec<u8>,
    pub light_value: u16,
    pub selected_program: u8,
}

impl ModuleStatusGp4Pir {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 6)?;
        Ok(Self {
            closed: byte_to_channels(data[0]),
            light_value: (((data[1] & 0x30) as u16) << 4) | data[2] as u16,
            selected_program: data[5] & 0x03,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_MODULE_STATUS,
            channels_to_byte(&self.closed),
            ((self.light_value & 0x300) >> 4) as u8,
            (self.light_value & 0xFF) as u8,
            0x00,
            0x00,
            self.selected_program,
        ]
    }
}

/// Pulse counter report from the VMB7IN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterStatus {
    pub channel: u8,
    /// Pulses per unit, in steps of 100.
    pub pulses: u32,
    pub counter: u32,
    /// Milliseconds per pulse; 0xFFFF means "slower than measurable".
    pub delay: u16,
}

impl CounterStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 7)?;
        Ok(Self {
            channel: (data[0] & 0x03) + 1,
            pulses: ((data[0] >> 2) as u32) * 100,
            counter: u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
            delay: u16::from_be_bytes([data[5], data[6]]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let counter = self.counter.to_be_bytes();
        let delay = self.delay.to_be_bytes();
        vec![
            CMD_COUNTER_STATUS,
            (self.channel - 1) | (((self.pulses / 100) as u8) << 2),
            counter[0],
            counter[1],
            counter[2],
            counter[3],
            delay[0],
            delay[1],
        ]
    }
}

/// Aggregate LED state push (on/slow/fast bitmaps).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLedStatus {
    pub led_on: Vec<u8>,
    pub led_slow_blinking: Vec<u8>,
    pub led_fast_blinking: Vec<u8>,
}

impl UpdateLedStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        Ok(Self {
            led_on: byte_to_channels(data[0]),
            led_slow_blinking: byte_to_channels(data[1]),
            led_fast_blinking: byte_to_channels(data[2]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_UPDATE_LED_STATUS,
            channels_to_byte(&self.led_on),
            channels_to_byte(&self.led_slow_blinking),
            channels_to_byte(&self.led_fast_blinking),
        ]
    }
}
