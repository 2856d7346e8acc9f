//! # Utility Modules
//!
//! Helpers shared by the codec and the radio-module layer.

pub mod hex;

pub use hex::{decode_hex, encode_hex_upper, format_hex_compact, HexError};
