//! VMBDALI gateway traffic. The DALI sub-bus is discovered at runtime:
//! device indices 1..64, group indices 65..80, broadcast 81.

use super::needs_data;
use crate::error::MessageError;
use num_enum::{FromPrimitive, IntoPrimitive};

pub const CMD_DIM_VALUE_STATUS: u8 = 0xA5;
pub const CMD_DALI_DEVICE_SETTINGS_REQUEST: u8 = 0xE7;
pub const CMD_DALI_DEVICE_SETTINGS: u8 = 0xE8;

/// First group index on the Velbus side of the gateway.
pub const DALI_FIRST_GROUP: u8 = 65;

/// Broadcast index covering every DALI device.
pub const DALI_BROADCAST: u8 = 81;

/// Number of addressable DALI devices behind one gateway.
pub const DALI_DEVICE_COUNT: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DaliDeviceType {
    FluorescentLamp = 0,
    EmergencyLamp = 1,
    DischargeLamp = 2,
    LowVoltageLamp = 3,
    Dimmer = 4,
    ConversionToDc = 5,
    LedModule = 6,
    Relay = 7,
    ColorControl = 8,
    Sequencer = 9,
    DevicePresent = 254,
    NoDevicePresent = 255,
    #[num_enum(catch_all)]
    Unknown(u8) = 10,
}

/// Setting selector used in settings requests and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DaliSetting {
    PowerOnLevel = 16,
    SystemFailureLevel = 17,
    MinimumLevel = 18,
    MaximumLevel = 19,
    FadeTimeAndRate = 20,
    GroupMembers = 21,
    DeviceType = 25,
    ActualLevel = 26,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Decoded body of a [`DaliDeviceSettings`] reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaliSettingValue {
    DeviceType(DaliDeviceType),
    /// Group indices (0-based on the DALI side) this device belongs to.
    MemberOfGroup(Vec<u8>),
    ActualLevel(u8),
    Raw { setting: DaliSetting, data: Vec<u8> },
}

/// Ask the gateway for device settings, read from its mirror memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaliDeviceSettingsRequest {
    pub channel: u8,
    /// `None` requests every setting of the channel.
    pub setting: Option<DaliSetting>,
}

impl DaliDeviceSettingsRequest {
    pub fn all_settings(channel: u8) -> Self {
        Self {
            channel,
            setting: None,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        Ok(Self {
            channel: data[0],
            setting: data.get(2).map(|s| DaliSetting::from_primitive(*s)),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![CMD_DALI_DEVICE_SETTINGS_REQUEST, self.channel, 0x00];
        if let Some(setting) = self.setting {
            data.push(setting.into());
        }
        data
    }
}

/// One setting of one DALI channel, pushed by the gateway during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaliDeviceSettings {
    pub channel: u8,
    pub value: DaliSettingValue,
}

impl DaliDeviceSettings {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        let setting = DaliSetting::from_primitive(data[1]);
        let body = &data[2..];
        let value = match setting {
            DaliSetting::DeviceType => {
                needs_data(body, 1)?;
                DaliSettingValue::DeviceType(DaliDeviceType::from_primitive(body[0]))
            }
            DaliSetting::GroupMembers => {
                needs_data(body, 2)?;
                let mask = u16::from_le_bytes([body[0], body[1]]);
                let groups = (0..16).filter(|g| mask & (1 << g) != 0).collect();
                DaliSettingValue::MemberOfGroup(groups)
            }
            DaliSetting::ActualLevel => {
                needs_data(body, 1)?;
                DaliSettingValue::ActualLevel(body[0])
            }
            other => DaliSettingValue::Raw {
                setting: other,
                data: body.to_vec(),
            },
        };
        Ok(Self {
            channel: data[0],
            value,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![CMD_DALI_DEVICE_SETTINGS, self.channel];
        match &self.value {
            DaliSettingValue::DeviceType(t) => {
                data.push(DaliSetting::DeviceType.into());
                data.push((*t).into());
            }
            DaliSettingValue::MemberOfGroup(groups) => {
                data.push(DaliSetting::GroupMembers.into());
                let mask: u16 = groups.iter().fold(0, |acc, g| acc | 1 << g);
                data.extend_from_slice(&mask.to_le_bytes());
            }
            DaliSettingValue::ActualLevel(level) => {
                data.push(DaliSetting::ActualLevel.into());
                data.push(*level);
            }
            DaliSettingValue::Raw { setting, data: raw } => {
                data.push((*setting).into());
                data.extend_from_slice(raw);
            }
        }
        data
    }
}

/// Dim levels for consecutive channels starting at `channel`. A channel of
/// 65..80 addresses a group, 81 every device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimValueStatus {
    pub channel: u8,
    pub dim_values: Vec<u8>,
}

impl DimValueStatus {
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 2)?;
        Ok(Self {
            channel: data[0],
            dim_values: data[1..].to_vec(),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![CMD_DIM_VALUE_STATUS, self.channel];
        data.extend_from_slice(&self.dim_values);
        data
    }
}
