//! The echonet module contains the ECHONET Lite codec: frame encoding and
//! decoding plus the smart meter property decoders. Nothing in here does I/O.

pub mod codes;
pub mod frame;
pub mod smart_meter;

pub use codes::{ObjectId, PropertyCode, ServiceCode};
pub use frame::{encode_request, power_request, validate_header, Edata, Frame, FrameFormat, Payload, Property};
pub use smart_meter::{decode_measurements, energy_unit, Direction, Measurement, MeterTimestamp};
