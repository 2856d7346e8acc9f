//! # broute-rs - Smart Meter Telemetry over the Wi-SUN B-Route
//!
//! The broute-rs crate reads a Japanese low-voltage smart meter through a
//! Wi-SUN radio module speaking the SKSTACK-IP text command set on a
//! serial port, and decodes the meter's ECHONET Lite responses.
//!
//! ## Features
//!
//! - ECHONET Lite frame encoding and decoding
//! - Decoding of instantaneous power and cumulative energy properties
//! - SKSTACK line classification (`OK`, `FAIL`, `EVENT`, `EPANDESC`, `ERXUDP`)
//! - Connection state machine: provision, active scan with retries, join
//! - Periodic power requests on a cancellable background task
//! - Reconnecting telemetry loop with a pluggable measurement sink
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! broute-rs = "1.0.0"
//! ```
//!
//! ```rust,no_run
//! use broute_rs::{BrouteConfig, BrouteModule, Credentials, Reception};
//!
//! # async fn example() -> Result<(), broute_rs::BrouteError> {
//! let config = BrouteConfig {
//!     device: "/dev/ttyUSB0".into(),
//!     ..BrouteConfig::default()
//! };
//! let mut module = BrouteModule::open(config, Credentials::from_env()?)?;
//! let mut session = module.connect().await?;
//! let transmitter = module.start_transmitter(&session)?;
//! while let Reception::Measurements(measurements) = module.receive(&mut session).await? {
//!     for m in measurements {
//!         println!("{m}");
//!     }
//! }
//! transmitter.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod broute;
pub mod config;
pub mod constants;
pub mod echonet;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod skstack;
pub mod util;

pub use crate::error::BrouteError;
pub use crate::logging::{init_logger, log_info, PowerUsageLog};

pub use broute::{BrouteModule, Reception, Session, TerminationReason, Transmitter};
pub use config::{BrouteConfig, Credentials};
pub use echonet::{Frame, Measurement, ObjectId, Property, PropertyCode, ServiceCode};
pub use orchestrator::{MeasurementSink, Orchestrator};
pub use skstack::ScanResult;

/// Decode a raw ECHONET Lite frame and the meter properties it carries.
///
/// # Arguments
/// * `bytes` - Frame bytes as received in an `ERXUDP` datagram
///
/// # Returns
/// * `Ok((Frame, Vec<Measurement>))` - Parsed frame and its measurements
/// * `Err(BrouteError)` - Header or structure invalid
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, Vec<Measurement>), BrouteError> {
    let frame = Frame::decode(bytes)?;
    let measurements = echonet::decode_measurements(&frame);
    Ok((frame, measurements))
}

/// Decode a frame given as a hex string, as printed by the radio module.
///
/// # Arguments
/// * `hex` - Hex digits, whitespace allowed
///
/// # Returns
/// * `Ok((Frame, Vec<Measurement>))` - Parsed frame and its measurements
/// * `Err(BrouteError)` - Invalid hex or invalid frame
pub fn decode_frame_hex(hex: &str) -> Result<(Frame, Vec<Measurement>), BrouteError> {
    let bytes = util::hex::decode_hex(hex)?;
    decode_frame(&bytes)
}
