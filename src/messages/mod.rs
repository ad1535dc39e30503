//! Typed message layer.
//!
//! Every bus command the library understands is a struct with a
//! `decode(data)` constructor (the data bytes after the command byte) and an
//! `encode_data()` that renders the full data block, command byte first.
//! [`Message`] is the tagged union the packet handler and the module layer
//! work with; [`MessageKind`] is the fieldless tag stored in the command
//! registry.

mod clock;
mod control;
mod dali;
mod name;
mod scan;
mod sensor;
mod status;

pub use clock::*;
pub use control::*;
pub use dali::*;
pub use name::*;
pub use scan::*;
pub use sensor::*;
pub use status::*;

use crate::consts::{PRIORITY_HIGH, PRIORITY_LOW};
use crate::error::MessageError;
use crate::frame::RawMessage;

/// Bit i set ⇔ channel i+1.
pub(crate) fn byte_to_channels(byte: u8) -> Vec<u8> {
    (0..8).filter(|bit| byte & (1 << bit) != 0).map(|bit| bit + 1).collect()
}

pub(crate) fn channels_to_byte(channels: &[u8]) -> u8 {
    channels
        .iter()
        .filter(|c| (1..=8).contains(*c))
        .fold(0, |acc, c| acc | 1 << (c - 1))
}

/// A bitmap that must carry exactly one channel.
pub(crate) fn byte_to_channel(byte: u8) -> Result<u8, MessageError> {
    let channels = byte_to_channels(byte);
    match channels.as_slice() {
        [single] => Ok(*single),
        _ => Err(MessageError::NotOneChannel(byte)),
    }
}

pub(crate) fn needs_data(data: &[u8], len: usize) -> Result<(), MessageError> {
    if data.len() < len {
        return Err(MessageError::InsufficientData {
            expected: len,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Every message the registry can produce or a channel operation can send.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Discovery and load
    ModuleTypeRequest(ModuleTypeRequest),
    ModuleType(ModuleType),
    ModuleSubType(ModuleSubType),
    ModuleStatusRequest(ModuleStatusRequest),
    ChannelNameRequest(ChannelNameRequest),
    ReadDataFromMemory(ReadDataFromMemory),
    ReadDataBlockFromMemory(ReadDataBlockFromMemory),
    CounterStatusRequest(CounterStatusRequest),

    // Status reports
    PushButtonStatus(PushButtonStatus),
    RelayStatus(RelayStatus),
    DimmerChannelStatus(DimmerChannelStatus),
    DimmerStatus(DimmerStatus),
    SliderStatus(SliderStatus),
    BlindStatus(BlindStatus),
    BlindStatusNg(BlindStatusNg),
    ModuleStatus(ModuleStatus),
    ModuleStatus2(ModuleStatus2),
    ModuleStatusPir(ModuleStatusPir),
    ModuleStatusGp4Pir(ModuleStatusGp4Pir),
    CounterStatus(CounterStatus),
    UpdateLedStatus(UpdateLedStatus),

    // Sensors
    SensorTemperature(SensorTemperature),
    TempSensorStatus(TempSensorStatus),
    MeteoRaw(MeteoRaw),
    SensorRaw(SensorRaw),

    // Names and memory
    ChannelNamePart(ChannelNamePart),
    MemoryData(MemoryData),
    MemoryDataBlock(MemoryDataBlock),

    // Commands
    SwitchRelayOn(SwitchRelayOn),
    SwitchRelayOff(SwitchRelayOff),
    SetDimmer(SetDimmer),
    RestoreDimmer(RestoreDimmer),
    CoverUp(CoverUp),
    CoverDown(CoverDown),
    CoverOff(CoverOff),
    CoverPosition(CoverPosition),
    SetLed(SetLed),
    ClearLed(ClearLed),
    SlowBlinkingLed(SlowBlinkingLed),
    FastBlinkingLed(FastBlinkingLed),
    SelectProgram(SelectProgram),
    MemoText(MemoText),
    SetTemperature(SetTemperature),
    SwitchToPreset(SwitchToPreset),
    SetCoolingMode(SetCoolingMode),
    SetHeatingMode(SetHeatingMode),

    // Clock broadcast
    SetRealtimeClock(SetRealtimeClock),
    SetDate(SetDate),
    SetDaylightSaving(SetDaylightSaving),

    // DALI
    DaliDeviceSettingsRequest(DaliDeviceSettingsRequest),
    DaliDeviceSettings(DaliDeviceSettings),
    DimValueStatus(DimValueStatus),
}

impl Message {
    /// Render the data block, command byte first. Empty for RTR frames.
    pub fn encode_data(&self) -> Vec<u8> {
        match self {
            Message::ModuleTypeRequest(m) => m.encode_data(),
            Message::ModuleType(m) => m.encode_data(),
            Message::ModuleSubType(m) => m.encode_data(),
            Message::ModuleStatusRequest(m) => m.encode_data(),
            Message::ChannelNameRequest(m) => m.encode_data(),
            Message::ReadDataFromMemory(m) => m.encode_data(),
            Message::ReadDataBlockFromMemory(m) => m.encode_data(),
            Message::CounterStatusRequest(m) => m.encode_data(),
            Message::PushButtonStatus(m) => m.encode_data(),
            Message::RelayStatus(m) => m.encode_data(),
            Message::DimmerChannelStatus(m) => m.encode_data(),
            Message::DimmerStatus(m) => m.encode_data(),
            Message::SliderStatus(m) => m.encode_data(),
            Message::BlindStatus(m) => m.encode_data(),
            Message::BlindStatusNg(m) => m.encode_data(),
            Message::ModuleStatus(m) => m.encode_data(),
            Message::ModuleStatus2(m) => m.encode_data(),
            Message::ModuleStatusPir(m) => m.encode_data(),
            Message::ModuleStatusGp4Pir(m) => m.encode_data(),
            Message::CounterStatus(m) => m.encode_data(),
            Message::UpdateLedStatus(m) => m.encode_data(),
            Message::SensorTemperature(m) => m.encode_data(),
            Message::TempSensorStatus(m) => m.encode_data(),
            Message::MeteoRaw(m) => m.encode_data(),
            Message::SensorRaw(m) => m.encode_data(),
            Message::ChannelNamePart(m) => m.encode_data(),
            Message::MemoryData(m) => m.encode_data(),
            Message::MemoryDataBlock(m) => m.encode_data(),
            Message::SwitchRelayOn(m) => m.encode_data(),
            Message::SwitchRelayOff(m) => m.encode_data(),
            Message::SetDimmer(m) => m.encode_data(),
            Message::RestoreDimmer(m) => m.encode_data(),
            Message::CoverUp(m) => m.encode_data(),
            Message::CoverDown(m) => m.encode_data(),
            Message::CoverOff(m) => m.encode_data(),
            Message::CoverPosition(m) => m.encode_data(),
            Message::SetLed(m) => m.encode_data(),
            Message::ClearLed(m) => m.encode_data(),
            Message::SlowBlinkingLed(m) => m.encode_data(),
            Message::FastBlinkingLed(m) => m.encode_data(),
            Message::SelectProgram(m) => m.encode_data(),
            Message::MemoText(m) => m.encode_data(),
            Message::SetTemperature(m) => m.encode_data(),
            Message::SwitchToPreset(m) => m.encode_data(),
            Message::SetCoolingMode(m) => m.encode_data(),
            Message::SetHeatingMode(m) => m.encode_data(),
            Message::SetRealtimeClock(m) => m.encode_data(),
            Message::SetDate(m) => m.encode_data(),
            Message::SetDaylightSaving(m) => m.encode_data(),
            Message::DaliDeviceSettingsRequest(m) => m.encode_data(),
            Message::DaliDeviceSettings(m) => m.encode_data(),
            Message::DimValueStatus(m) => m.encode_data(),
        }
    }

    /// Wire priority. Push-button edges and actuator commands go out at
    /// high priority, everything else is low.
    pub fn priority(&self) -> u8 {
        match self {
            Message::PushButtonStatus(_)
            | Message::SliderStatus(_)
            | Message::SetDimmer(_)
            | Message::RestoreDimmer(_)
            | Message::CoverUp(_)
            | Message::CoverDown(_)
            | Message::CoverOff(_)
            | Message::CoverPosition(_) => PRIORITY_HIGH,
            _ => PRIORITY_LOW,
        }
    }

    pub fn rtr(&self) -> bool {
        matches!(self, Message::ModuleTypeRequest(_))
    }

    /// Build the wire frame for `address`.
    pub fn to_raw(&self, address: u8) -> RawMessage {
        RawMessage::new(self.priority(), address, self.rtr(), self.encode_data())
    }
}

/// Fieldless decode tag stored in the command registry.
///
/// Where the same command byte carries different layouts per module family
/// (relay status vs. blind status, bit-indexed vs. byte-indexed names) each
/// layout gets its own kind and the registry picks the right one through
/// per-module overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ModuleType,
    ModuleSubType,
    ModuleSubTypeBank4,
    ModuleSubTypeBank8,
    ModuleStatusRequest,
    ChannelNameRequest,
    ChannelNameRequestBlind,
    ReadDataFromMemory,
    ReadDataBlockFromMemory,
    CounterStatusRequest,
    PushButtonStatus,
    RelayStatus,
    DimmerChannelStatus,
    DimmerStatus,
    SliderStatus,
    BlindStatus,
    BlindStatusNg,
    ModuleStatus,
    ModuleStatus2,
    ModuleStatusPir,
    ModuleStatusGp4Pir,
    CounterStatus,
    UpdateLedStatus,
    SensorTemperature,
    TempSensorStatus,
    MeteoRaw,
    SensorRaw,
    ChannelNamePart1,
    ChannelNamePart2,
    ChannelNamePart3,
    ChannelNamePart1Indexed,
    ChannelNamePart2Indexed,
    ChannelNamePart3Indexed,
    ChannelNamePart1Blind,
    ChannelNamePart2Blind,
    ChannelNamePart3Blind,
    MemoryData,
    MemoryDataBlock,
    SwitchRelayOn,
    SwitchRelayOff,
    SetDimmer,
    SetDimmerDali,
    RestoreDimmer,
    CoverUp,
    CoverDown,
    CoverOff,
    CoverPosition,
    CoverUpBlind,
    CoverDownBlind,
    CoverOffBlind,
    SetLed,
    ClearLed,
    SlowBlinkingLed,
    FastBlinkingLed,
    SelectProgram,
    MemoText,
    SetTemperature,
    SwitchToComfort,
    SwitchToDay,
    SwitchToNight,
    SwitchToSafe,
    SetCoolingMode,
    SetHeatingMode,
    SetRealtimeClock,
    SetDate,
    SetDaylightSaving,
    DaliDeviceSettingsRequest,
    DaliDeviceSettings,
    DimValueStatus,
}

impl MessageKind {
    /// Decode a raw frame into the typed message this kind stands for.
    pub fn decode(self, raw: &RawMessage) -> Result<Message, MessageError> {
        let data = raw.data_only();
        Ok(match self {
            MessageKind::ModuleType => Message::ModuleType(ModuleType::decode(data)?),
            MessageKind::ModuleSubType => {
                Message::ModuleSubType(ModuleSubType::decode(data, 0)?)
            }
            MessageKind::ModuleSubTypeBank4 => {
                Message::ModuleSubType(ModuleSubType::decode(data, 4)?)
            }
            MessageKind::ModuleSubTypeBank8 => {
                Message::ModuleSubType(ModuleSubType::decode(data, 8)?)
            }
            MessageKind::ModuleStatusRequest => {
                Message::ModuleStatusRequest(ModuleStatusRequest::decode(data)?)
            }
            MessageKind::ChannelNameRequest => {
                Message::ChannelNameRequest(ChannelNameRequest::decode(data)?)
            }
            MessageKind::ChannelNameRequestBlind => {
                Message::ChannelNameRequest(ChannelNameRequest::decode_blind(data)?)
            }
            MessageKind::ReadDataFromMemory => {
                Message::ReadDataFromMemory(ReadDataFromMemory::decode(data)?)
            }
            MessageKind::ReadDataBlockFromMemory => {
                Message::ReadDataBlockFromMemory(ReadDataBlockFromMemory::decode(data)?)
            }
            MessageKind::CounterStatusRequest => {
                Message::CounterStatusRequest(CounterStatusRequest::decode(data)?)
            }
            MessageKind::PushButtonStatus => {
                Message::PushButtonStatus(PushButtonStatus::decode(data)?)
            }
            MessageKind::RelayStatus => Message::RelayStatus(RelayStatus::decode(data)?),
            MessageKind::DimmerChannelStatus => {
                Message::DimmerChannelStatus(DimmerChannelStatus::decode(data)?)
            }
            MessageKind::DimmerStatus => Message::DimmerStatus(DimmerStatus::decode(data)?),
            MessageKind::SliderStatus => Message::SliderStatus(SliderStatus::decode(data)?),
            MessageKind::BlindStatus => Message::BlindStatus(BlindStatus::decode(data)?),
            MessageKind::BlindStatusNg => Message::BlindStatusNg(BlindStatusNg::decode(data)?),
            MessageKind::ModuleStatus => Message::ModuleStatus(ModuleStatus::decode(data)?),
            MessageKind::ModuleStatus2 => Message::ModuleStatus2(ModuleStatus2::decode(data)?),
            MessageKind::ModuleStatusPir => {
                Message::ModuleStatusPir(ModuleStatusPir::decode(data)?)
            }
            MessageKind::ModuleStatusGp4Pir => {
                Message::ModuleStatusGp4Pir(ModuleStatusGp4Pir::decode(data)?)
            }
            MessageKind::CounterStatus => Message::CounterStatus(CounterStatus::decode(data)?),
            MessageKind::UpdateLedStatus => {
                Message::UpdateLedStatus(UpdateLedStatus::decode(data)?)
            }
            MessageKind::SensorTemperature => {
                Message::SensorTemperature(SensorTemperature::decode(data)?)
            }
            MessageKind::TempSensorStatus => {
                Message::TempSensorStatus(TempSensorStatus::decode(data)?)
            }
            MessageKind::MeteoRaw => Message::MeteoRaw(MeteoRaw::decode(data)?),
            MessageKind::SensorRaw => Message::SensorRaw(SensorRaw::decode(data)?),
            MessageKind::ChannelNamePart1 => {
                Message::ChannelNamePart(ChannelNamePart::decode(1, ChannelIndexing::Bit, data)?)
            }
            MessageKind::ChannelNamePart2 => {
                Message::ChannelNamePart(ChannelNamePart::decode(2, ChannelIndexing::Bit, data)?)
            }
            MessageKind::ChannelNamePart3 => {
                Message::ChannelNamePart(ChannelNamePart::decode(3, ChannelIndexing::Bit, data)?)
            }
            MessageKind::ChannelNamePart1Indexed => {
                Message::ChannelNamePart(ChannelNamePart::decode(1, ChannelIndexing::Byte, data)?)
            }
            MessageKind::ChannelNamePart2Indexed => {
                Message::ChannelNamePart(ChannelNamePart::decode(2, ChannelIndexing::Byte, data)?)
            }
            MessageKind::ChannelNamePart3Indexed => {
                Message::ChannelNamePart(ChannelNamePart::decode(3, ChannelIndexing::Byte, data)?)
            }
            MessageKind::ChannelNamePart1Blind => {
                Message::ChannelNamePart(ChannelNamePart::decode(1, ChannelIndexing::TwoBit, data)?)
            }
            MessageKind::ChannelNamePart2Blind => {
                Message::ChannelNamePart(ChannelNamePart::decode(2, ChannelIndexing::TwoBit, data)?)
            }
            MessageKind::ChannelNamePart3Blind => {
                Message::ChannelNamePart(ChannelNamePart::decode(3, ChannelIndexing::TwoBit, data)?)
            }
            MessageKind::MemoryData => Message::MemoryData(MemoryData::decode(data)?),
            MessageKind::MemoryDataBlock => {
                Message::MemoryDataBlock(MemoryDataBlock::decode(data)?)
            }
            MessageKind::SwitchRelayOn => Message::SwitchRelayOn(SwitchRelayOn::decode(data)?),
            MessageKind::SwitchRelayOff => Message::SwitchRelayOff(SwitchRelayOff::decode(data)?),
            MessageKind::SetDimmer => {
                Message::SetDimmer(SetDimmer::decode(DimmerChannelMode::Bitmask, data)?)
            }
            MessageKind::SetDimmerDali => {
                Message::SetDimmer(SetDimmer::decode(DimmerChannelMode::Raw, data)?)
            }
            MessageKind::RestoreDimmer => Message::RestoreDimmer(RestoreDimmer::decode(data)?),
            MessageKind::CoverUp => Message::CoverUp(CoverUp::decode(data)?),
            MessageKind::CoverDown => Message::CoverDown(CoverDown::decode(data)?),
            MessageKind::CoverOff => Message::CoverOff(CoverOff::decode(data)?),
            MessageKind::CoverPosition => Message::CoverPosition(CoverPosition::decode(data)?),
            MessageKind::CoverUpBlind => Message::CoverUp(CoverUp::decode_blind(data)?),
            MessageKind::CoverDownBlind => Message::CoverDown(CoverDown::decode_blind(data)?),
            MessageKind::CoverOffBlind => Message::CoverOff(CoverOff::decode_blind(data)?),
            MessageKind::SetLed => Message::SetLed(SetLed::decode(data)?),
            MessageKind::ClearLed => Message::ClearLed(ClearLed::decode(data)?),
            MessageKind::SlowBlinkingLed => {
                Message::SlowBlinkingLed(SlowBlinkingLed::decode(data)?)
            }
            MessageKind::FastBlinkingLed => {
                Message::FastBlinkingLed(FastBlinkingLed::decode(data)?)
            }
            MessageKind::SelectProgram => Message::SelectProgram(SelectProgram::decode(data)?),
            MessageKind::MemoText => Message::MemoText(MemoText::decode(data)?),
            MessageKind::SetTemperature => Message::SetTemperature(SetTemperature::decode(data)?),
            MessageKind::SwitchToComfort => {
                Message::SwitchToPreset(SwitchToPreset::decode(ClimatePreset::Comfort, data)?)
            }
            MessageKind::SwitchToDay => {
                Message::SwitchToPreset(SwitchToPreset::decode(ClimatePreset::Day, data)?)
            }
            MessageKind::SwitchToNight => {
                Message::SwitchToPreset(SwitchToPreset::decode(ClimatePreset::Night, data)?)
            }
            MessageKind::SwitchToSafe => {
                Message::SwitchToPreset(SwitchToPreset::decode(ClimatePreset::Safe, data)?)
            }
            MessageKind::SetCoolingMode => Message::SetCoolingMode(SetCoolingMode),
            MessageKind::SetHeatingMode => Message::SetHeatingMode(SetHeatingMode),
            MessageKind::SetRealtimeClock => {
                Message::SetRealtimeClock(SetRealtimeClock::decode(data)?)
            }
            MessageKind::SetDate => Message::SetDate(SetDate::decode(data)?),
            MessageKind::SetDaylightSaving => {
                Message::SetDaylightSaving(SetDaylightSaving::decode(data)?)
            }
            MessageKind::DaliDeviceSettingsRequest => {
                Message::DaliDeviceSettingsRequest(DaliDeviceSettingsRequest::decode(data)?)
            }
            MessageKind::DaliDeviceSettings => {
                Message::DaliDeviceSettings(DaliDeviceSettings::decode(data)?)
            }
            MessageKind::DimValueStatus => Message::DimValueStatus(DimValueStatus::decode(data)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_roundtrip() {
        assert_eq!(byte_to_channels(0b0000_0101), vec![1, 3]);
        assert_eq!(channels_to_byte(&[1, 3]), 0b0000_0101);
        assert_eq!(byte_to_channel(0b0000_0100).unwrap(), 3);
        assert!(byte_to_channel(0b0000_0101).is_err());
    }
}
