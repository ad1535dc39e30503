// Wire-level and timing constants for the Velbus protocol.

use std::time::Duration;

/// First byte of every frame (STX).
pub const START_BYTE: u8 = 0x0F;

/// Last byte of every frame (ETX).
pub const END_BYTE: u8 = 0x04;

/// RTR flag in the high nibble of the length byte.
pub const RTR: u8 = 0x40;

/// Low nibble of the length byte carries the data length.
pub const LENGTH_MASK: u8 = 0x0F;

/// Header: start byte, priority, address, RTR + data length.
pub const HEADER_LENGTH: usize = 4;

/// Tail: checksum, end byte.
pub const TAIL_LENGTH: usize = 2;

/// Maximum number of data bytes in one frame.
pub const MAX_DATA_SIZE: usize = 8;

/// Smallest possible frame (header + tail, no data).
pub const MIN_FRAME_SIZE: usize = HEADER_LENGTH + TAIL_LENGTH;

/// Largest possible frame.
pub const MAX_FRAME_SIZE: usize = MIN_FRAME_SIZE + MAX_DATA_SIZE;

pub const PRIORITY_HIGH: u8 = 0xF8;
pub const PRIORITY_FIRMWARE: u8 = 0xF9;
pub const PRIORITY_THIRDPARTY: u8 = 0xFA;
pub const PRIORITY_LOW: u8 = 0xFB;

pub const PRIORITIES: [u8; 4] = [
    PRIORITY_HIGH,
    PRIORITY_FIRMWARE,
    PRIORITY_THIRDPARTY,
    PRIORITY_LOW,
];

/// Time to wait for a ModuleType reply during the address sweep.
pub const SCAN_MODULETYPE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Time to wait for the first info reply once a module load starts.
pub const SCAN_MODULEINFO_TIMEOUT_INITIAL: Duration = Duration::from_millis(1000);

/// Inactivity budget between consecutive info replies during a module load.
pub const SCAN_MODULEINFO_TIMEOUT_INTERVAL: Duration = Duration::from_millis(150);

/// Upper bound for the whole load phase.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Poll interval of the load-completion watchdog.
pub const LOAD_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Per-module share of the load budget.
pub const LOAD_TIMEOUT_PER_MODULE: Duration = Duration::from_secs(30);

/// Minimum gap between two outgoing frames. One Velbus byte-time is about
/// 260 µs, but many modules drop messages at back-to-back cadence.
pub const SEND_PACING: Duration = Duration::from_millis(60);

/// Pacing multiplier after a channel-name request (0xEF): the worst-case
/// response burst is ~99 packets from a fully populated input module.
pub const NAME_REQUEST_PACING_FACTOR: u32 = 33;

/// Maximum write attempts before the writer surfaces a reconnect.
pub const WRITE_MAX_ATTEMPTS: u32 = 10;

/// Synthetic channel numbers used by input panels.
pub const CHANNEL_SELECTED_PROGRAM: u8 = 96;
pub const CHANNEL_EDGE_LIT: u8 = 97;
pub const CHANNEL_MEMO_TEXT: u8 = 98;
pub const CHANNEL_LIGHT_VALUE: u8 = 99;

/// Serial port settings for direct bus access.
pub const SERIAL_BAUD_RATE: u32 = 38400;

/// Commands that count as "the module is still answering the load":
/// channel name parts, relay status, memory data and memory blocks.
pub const LOAD_EVIDENCE_COMMANDS: [u8; 6] = [0xF0, 0xF1, 0xF2, 0xFB, 0xFE, 0xCC];

pub const TEMP_CELSIUS: &str = "°C";
pub const ENERGY_KILO_WATT_HOUR: &str = "kWh";
pub const VOLUME_CUBIC_METER_HOUR: &str = "m³/h";
pub const VOLUME_LITERS_HOUR: &str = "L/h";

/// Version tag written into every cache file; bump to invalidate old caches.
pub const CACHE_VERSION: u32 = 2;
