//! Clock broadcasts. Modules with schedules keep local time; the
//! controller refreshes it from the host clock.

use super::needs_data;
use crate::error::MessageError;
use chrono::{Datelike, Local, Timelike};

pub const CMD_SET_REALTIME_CLOCK: u8 = 0xD8;
pub const CMD_SET_DATE: u8 = 0xB7;
pub const CMD_SET_DAYLIGHT_SAVING: u8 = 0xAF;

/// Day-of-week, hour and minute. Velbus counts days from Monday = 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRealtimeClock {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
}

impl SetRealtimeClock {
    pub fn from_local_time() -> Self {
        let now = Local::now();
        Self {
            weekday: now.weekday().num_days_from_monday() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 3)?;
        Ok(Self {
            weekday: data[0],
            hour: data[1],
            minute: data[2],
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![CMD_SET_REALTIME_CLOCK, self.weekday, self.hour, self.minute]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDate {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl SetDate {
    pub fn from_local_time() -> Self {
        let now = Local::now();
        Self {
            day: now.day() as u8,
            month: now.month() as u8,
            year: now.year() as u16,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 4)?;
        Ok(Self {
            day: data[0],
            month: data[1],
            year: u16::from_be_bytes([data[2], data[3]]),
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![
            CMD_SET_DATE,
            self.day,
            self.month,
            (self.year >> 8) as u8,
            (self.year & 0xFF) as u8,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDaylightSaving {
    pub enabled: bool,
}

impl SetDaylightSaving {
    pub fn from_local_time() -> Self {
        // chrono does not expose a DST flag directly; compare the local
        // offset against the January offset of the same year.
        let now = Local::now();
        let winter = now
            .with_month(1)
            .and_then(|d| d.with_day(1))
            .map(|d| d.offset().local_minus_utc())
            .unwrap_or_else(|| now.offset().local_minus_utc());
        Self {
            enabled: now.offset().local_minus_utc() != winter,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        needs_data(data, 1)?;
        Ok(Self {
            enabled: data[0] != 0,
        })
    }

    pub fn encode_data(&self) -> Vec<u8> {
        vec![CMD_SET_DAYLIGHT_SAVING, self.enabled as u8]
    }
}
