//! # B-route Error Handling
//!
//! This module defines the BrouteError enum, which represents the different error
//! types that can occur in the broute-rs crate.

use crate::util::hex::HexError;
use thiserror::Error;

/// Represents the different error types that can occur in the B-route crate.
#[derive(Debug, Error)]
pub enum BrouteError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// The radio module stopped delivering data (end of stream).
    #[error("Serial connection closed")]
    ConnectionClosed,

    /// No reply to a command arrived in time.
    #[error("Timed out waiting for reply to {0}")]
    Timeout(String),

    /// The ECHONET Lite header carries an unexpected protocol type.
    #[error("Invalid protocol type: 0x{0:02X}")]
    InvalidProtocolType(u8),

    /// The ECHONET Lite header carries an unknown frame format.
    #[error("Invalid frame format: 0x{0:02X}")]
    InvalidFormat(u8),

    /// Indicates an error when parsing an ECHONET Lite frame.
    #[error("Malformed ECHONET Lite frame: {0}")]
    MalformedFrame(String),

    /// Indicates an invalid hexadecimal string was provided.
    #[error("Invalid hexadecimal string: {0}")]
    InvalidHexString(String),

    /// A radio module event line could not be interpreted.
    #[error("Invalid event line: {0}")]
    InvalidEvent(String),

    /// The radio module rejected a command with `FAIL ER<code>`.
    #[error("Command {command} failed with ER{code}")]
    CommandFailed { command: String, code: String },

    /// Active scan found no coordinator within the retry budget.
    #[error("No channel found after {attempts} scan attempts")]
    ScanExhausted { attempts: u32 },

    /// The link-local address could not be derived from the MAC address.
    #[error("IPv6 address derivation failed: {0}")]
    AddressDerivationFailed(String),

    /// PANA authentication reported a failure.
    #[error("PANA join failed")]
    JoinFailed,

    /// Property data exceeds the one-byte length field.
    #[error("Property 0x{code:02X} carries {len} bytes (max 255)")]
    PropertyTooLong { code: u8, len: usize },

    /// More properties than the one-byte count field allows.
    #[error("Too many properties: {0} (max 255)")]
    TooManyProperties(usize),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A catch‑all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}

impl BrouteError {
    /// Failures of the byte transport itself. These end the current session.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BrouteError::SerialPortError(_) | BrouteError::ConnectionClosed | BrouteError::Timeout(_)
        )
    }

    /// Undecodable data. The offending frame or line is dropped and reception continues.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            BrouteError::InvalidProtocolType(_)
                | BrouteError::InvalidFormat(_)
                | BrouteError::MalformedFrame(_)
                | BrouteError::InvalidHexString(_)
                | BrouteError::InvalidEvent(_)
        )
    }
}

impl From<std::io::Error> for BrouteError {
    fn from(e: std::io::Error) -> Self {
        BrouteError::SerialPortError(e.to_string())
    }
}

impl From<tokio_serial::Error> for BrouteError {
    fn from(e: tokio_serial::Error) -> Self {
        BrouteError::SerialPortError(e.to_string())
    }
}

impl From<HexError> for BrouteError {
    fn from(e: HexError) -> Self {
        BrouteError::InvalidHexString(e.to_string())
    }
}

impl From<serde_json::Error> for BrouteError {
    fn from(e: serde_json::Error) -> Self {
        BrouteError::ConfigError(e.to_string())
    }
}
