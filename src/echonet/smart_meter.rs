//! # Low-Voltage Smart Meter Properties
//!
//! Turns the property records of a decoded frame into typed
//! [`Measurement`]s. Cumulative energy values are scaled by the unit
//! reported in property 0xE1 of the *same* frame.

use crate::constants::DEFAULT_ENERGY_UNIT;
use crate::echonet::codes::PropertyCode;
use crate::echonet::frame::{Frame, Property};
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use log::warn;
use serde::Serialize;
use std::fmt;

/// Measurement direction of a cumulative energy value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Energy bought from the grid
    Forward,
    /// Energy sold to the grid
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

/// Meter clock value attached to a fixed-time reading.
///
/// Kept as raw fields: meters report placeholder dates that are not valid
/// calendar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeterTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl MeterTimestamp {
    /// Calendar value of the timestamp, `None` for placeholder dates such
    /// as `FFFF-FF-FF`.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

impl fmt::Display for MeterTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A decoded reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Measurement {
    InstantaneousPower {
        watts: u64,
    },
    CumulativeEnergy {
        direction: Direction,
        kwh: f64,
    },
    CumulativeEnergySnapshot {
        direction: Direction,
        kwh: f64,
        timestamp: MeterTimestamp,
    },
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::InstantaneousPower { watts } => write!(f, "instantaneous power:{watts}W"),
            Measurement::CumulativeEnergy { direction, kwh } => {
                write!(f, "cumulative energy ({direction}):{kwh:.1}kWh")
            }
            Measurement::CumulativeEnergySnapshot {
                direction,
                kwh,
                timestamp,
            } => write!(f, "fixed-time cumulative energy ({direction}):{kwh:.1}kWh({timestamp})"),
        }
    }
}

/// Map the 0xE1 unit code to a kWh multiplier.
pub fn unit_multiplier(code: u8) -> Option<f64> {
    match code {
        0x00 => Some(1.0),
        0x01 => Some(0.1),
        0x02 => Some(0.01),
        0x03 => Some(0.001),
        0x04 => Some(0.0001),
        0x0A => Some(10.0),
        0x0B => Some(100.0),
        0x0C => Some(1000.0),
        0x0D => Some(10000.0),
        _ => None,
    }
}

/// Resolve the cumulative energy unit of a frame. Absent or unknown → 0.1.
pub fn energy_unit(properties: &[Property]) -> f64 {
    find(properties, PropertyCode::CumulativeEnergyUnit)
        .and_then(Property::data)
        .and_then(|d| d.first().copied())
        .and_then(unit_multiplier)
        .unwrap_or(DEFAULT_ENERGY_UNIT)
}

/// Decode every recognised meter property of `frame`.
///
/// Order: instantaneous power, forward energy, reverse energy, forward
/// snapshot, reverse snapshot. Properties that cannot be decoded are
/// skipped.
pub fn decode_measurements(frame: &Frame) -> Vec<Measurement> {
    let properties = frame.properties();
    let unit = energy_unit(properties);
    let mut out = Vec::new();

    if let Some(m) = decode_instantaneous_power(properties) {
        out.push(m);
    }
    for (code, direction) in [
        (PropertyCode::CumulativeEnergyForward, Direction::Forward),
        (PropertyCode::CumulativeEnergyReverse, Direction::Reverse),
    ] {
        if let Some(m) = decode_cumulative_energy(properties, code, direction, unit) {
            out.push(m);
        }
    }
    for (code, direction) in [
        (PropertyCode::FixedTimeEnergyForward, Direction::Forward),
        (PropertyCode::FixedTimeEnergyReverse, Direction::Reverse),
    ] {
        if let Some(m) = decode_snapshot(properties, code, direction, unit) {
            out.push(m);
        }
    }

    out
}

pub fn decode_instantaneous_power(properties: &[Property]) -> Option<Measurement> {
    let data = property_data(properties, PropertyCode::InstantaneousPower)?;
    let watts = be_uint(data).or_else(|| skip(PropertyCode::InstantaneousPower, data))?;
    Some(Measurement::InstantaneousPower { watts })
}

pub fn decode_cumulative_energy(
    properties: &[Property],
    code: PropertyCode,
    direction: Direction,
    unit: f64,
) -> Option<Measurement> {
    let data = property_data(properties, code)?;
    let raw = be_uint(data).or_else(|| skip(code, data))?;
    Some(Measurement::CumulativeEnergy {
        direction,
        kwh: scale(raw, unit),
    })
}

pub fn decode_snapshot(
    properties: &[Property],
    code: PropertyCode,
    direction: Direction,
    unit: f64,
) -> Option<Measurement> {
    let data = property_data(properties, code)?;
    if data.len() < 8 {
        return skip(code, data);
    }
    let timestamp = MeterTimestamp {
        year: u16::from_be_bytes([data[0], data[1]]),
        month: data[2],
        day: data[3],
        hour: data[4],
        minute: data[5],
        second: data[6],
    };
    let raw = be_uint(&data[7..]).or_else(|| skip(code, data))?;
    if timestamp.to_naive().is_none() {
        warn!("{:?} (0x{:02X}) carries no valid date: {timestamp}", code, u8::from(code));
    }
    Some(Measurement::CumulativeEnergySnapshot {
        direction,
        kwh: scale(raw, unit),
        timestamp,
    })
}

fn find(properties: &[Property], code: PropertyCode) -> Option<&Property> {
    let code = u8::from(code);
    properties.iter().find(|p| p.code() == code)
}

fn property_data(properties: &[Property], code: PropertyCode) -> Option<&[u8]> {
    find(properties, code)?.data()
}

/// Unsigned big-endian integer of at most eight bytes.
fn be_uint(data: &[u8]) -> Option<u64> {
    if data.is_empty() || data.len() > 8 {
        return None;
    }
    Some(data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Scale by unit and round half away from zero to one decimal.
fn scale(raw: u64, unit: f64) -> f64 {
    (raw as f64 * unit * 10.0).round() / 10.0
}

fn skip<T>(code: PropertyCode, data: &[u8]) -> Option<T> {
    warn!("Skipping {:?} (0x{:02X}) with {} undecodable bytes", code, u8::from(code), data.len());
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(code: u8, data: &[u8]) -> Property {
        Property::new(code, Some(data.to_vec()))
    }

    #[test]
    fn test_rounding() {
        assert_eq!(scale(1000, 0.1), 100.0);
        assert_eq!(scale(12346, 0.01), 123.5);
        assert_eq!(scale(12344, 0.01), 123.4);
        assert_eq!(scale(7, 10000.0), 70000.0);
    }

    #[test]
    fn test_be_uint_limits() {
        assert_eq!(be_uint(&[0x01, 0xF4]), Some(500));
        assert_eq!(be_uint(&[]), None);
        assert_eq!(be_uint(&[0; 9]), None);
    }

    #[test]
    fn test_first_match_wins() {
        let props = vec![prop(0xE7, &[0x00, 0x00, 0x00, 0x0A]), prop(0xE7, &[0x00, 0x00, 0x00, 0x0B])];
        assert_eq!(
            decode_instantaneous_power(&props),
            Some(Measurement::InstantaneousPower { watts: 10 })
        );
    }

    #[test]
    fn test_snapshot_too_short_is_skipped() {
        let props = vec![prop(0xEA, &[0x07, 0xE8, 0x03])];
        assert_eq!(
            decode_snapshot(&props, PropertyCode::FixedTimeEnergyForward, Direction::Forward, 0.1),
            None
        );
    }

    #[test]
    fn test_placeholder_snapshot_still_decoded() {
        let props = vec![prop(
            0xEB,
            &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x0A],
        )];
        match decode_snapshot(&props, PropertyCode::FixedTimeEnergyReverse, Direction::Reverse, 0.1) {
            Some(Measurement::CumulativeEnergySnapshot { kwh, timestamp, .. }) => {
                assert_eq!(kwh, 1.0);
                assert_eq!(timestamp.year, 0xFFFF);
                assert_eq!(timestamp.to_naive(), None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_padding() {
        let ts = MeterTimestamp {
            year: 2024,
            month: 3,
            day: 1,
            hour: 0,
            minute: 5,
            second: 9,
        };
        assert_eq!(ts.to_string(), "2024-03-01 00:05:09");
        assert!(ts.to_naive().is_some());

        let placeholder = MeterTimestamp {
            year: 0xFFFF,
            month: 0xFF,
            day: 0xFF,
            hour: 0xFF,
            minute: 0xFF,
            second: 0xFF,
        };
        assert_eq!(placeholder.to_naive(), None);
    }

    #[test]
    fn test_display() {
        let m = Measurement::CumulativeEnergy {
            direction: Direction::Reverse,
            kwh: 12.0,
        };
        assert_eq!(m.to_string(), "cumulative energy (reverse):12.0kWh");
    }
}
