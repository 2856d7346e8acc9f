//! B-route Protocol Constants
//!
//! Byte-level constants of ECHONET Lite and the SKSTACK-IP radio module.
//! Code values that form a closed set (services, properties, objects) are
//! enums in [`crate::echonet::codes`].

/// EHD1: ECHONET Lite protocol type
pub const ECHONET_PROTOCOL_TYPE: u8 = 0x10;

/// EHD2: specified message format (decodable EDATA)
pub const ECHONET_FORMAT_1: u8 = 0x81;

/// EHD2: arbitrary message format (validated, not decoded)
pub const ECHONET_FORMAT_2: u8 = 0x82;

/// UDP port of ECHONET Lite
pub const ECHONET_UDP_PORT: u16 = 0x0E1A;

/// UDP port used by PANA authentication traffic
pub const PANA_UDP_PORT: u16 = 0x02CC;

// ----------------------------------------------------------------------------
// SKSTACK-IP event numbers (`EVENT <nn>`)
// ----------------------------------------------------------------------------

pub const SK_EVENT_BEACON_RECEIVED: u8 = 0x20;
pub const SK_EVENT_UDP_SENT: u8 = 0x21;
pub const SK_EVENT_SCAN_COMPLETED: u8 = 0x22;
pub const SK_EVENT_PANA_FAILED: u8 = 0x24;
pub const SK_EVENT_PANA_CONNECTED: u8 = 0x25;
pub const SK_EVENT_SESSION_TERMINATION_REQUESTED: u8 = 0x26;
pub const SK_EVENT_SESSION_TERMINATED: u8 = 0x27;
pub const SK_EVENT_SESSION_TERMINATION_TIMEOUT: u8 = 0x28;
pub const SK_EVENT_SESSION_EXPIRED: u8 = 0x29;

// ----------------------------------------------------------------------------
// SKSTACK-IP command parameters
// ----------------------------------------------------------------------------

/// `SKSCAN` mode 2: active scan with information element
pub const SK_SCAN_MODE_ACTIVE: u8 = 2;

/// `SKSCAN` channel mask covering every channel
pub const SK_SCAN_CHANNEL_MASK: u32 = 0xFFFF_FFFF;

/// `SKSENDTO` UDP handle
pub const SK_UDP_HANDLE: u8 = 1;

/// `SKSENDTO` security flag (encrypt)
pub const SK_SEC_ENCRYPTED: u8 = 1;

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_SCAN_RETRIES: u32 = 5;
pub const DEFAULT_SCAN_DURATION: u8 = 6;
pub const DEFAULT_SCAN_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_TRANSMIT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 10;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Cumulative energy unit used when the meter does not report 0xE1
pub const DEFAULT_ENERGY_UNIT: f64 = 0.1;
