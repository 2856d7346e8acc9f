//! ECHONET Lite code tables
//!
//! Only the services, objects and low-voltage smart meter properties this
//! crate talks about are named here.

use serde::Serialize;
use std::fmt;

/// ESV service codes.
///
/// 0x62 is a request (Get) on the way out and is reused by this system for
/// the notify/response context, so it is a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ServiceCode {
    WriteNoResponse = 0x60,
    Write = 0x61,
    Read = 0x62,
    WriteRead = 0x6E,
    ReadNotPossible = 0x52,
    ReadResponse = 0x72,
    Notify = 0x73,
}

impl TryFrom<u8> for ServiceCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x60 => Ok(ServiceCode::WriteNoResponse),
            0x61 => Ok(ServiceCode::Write),
            0x62 => Ok(ServiceCode::Read),
            0x6E => Ok(ServiceCode::WriteRead),
            0x52 => Ok(ServiceCode::ReadNotPossible),
            0x72 => Ok(ServiceCode::ReadResponse),
            0x73 => Ok(ServiceCode::Notify),
            other => Err(other),
        }
    }
}

impl From<ServiceCode> for u8 {
    fn from(code: ServiceCode) -> u8 {
        code as u8
    }
}

/// EPC property codes of the low-voltage smart meter class (0x02 0x88).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PropertyCode {
    OperationStatus = 0x80,
    CumulativeEnergyDigits = 0xD7,
    CumulativeEnergyForward = 0xE0,
    CumulativeEnergyUnit = 0xE1,
    CumulativeEnergyReverse = 0xE3,
    InstantaneousPower = 0xE7,
    InstantaneousCurrent = 0xE8,
    FixedTimeEnergyForward = 0xEA,
    FixedTimeEnergyReverse = 0xEB,
}

impl TryFrom<u8> for PropertyCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(PropertyCode::OperationStatus),
            0xD7 => Ok(PropertyCode::CumulativeEnergyDigits),
            0xE0 => Ok(PropertyCode::CumulativeEnergyForward),
            0xE1 => Ok(PropertyCode::CumulativeEnergyUnit),
            0xE3 => Ok(PropertyCode::CumulativeEnergyReverse),
            0xE7 => Ok(PropertyCode::InstantaneousPower),
            0xE8 => Ok(PropertyCode::InstantaneousCurrent),
            0xEA => Ok(PropertyCode::FixedTimeEnergyForward),
            0xEB => Ok(PropertyCode::FixedTimeEnergyReverse),
            other => Err(other),
        }
    }
}

impl From<PropertyCode> for u8 {
    fn from(code: PropertyCode) -> u8 {
        code as u8
    }
}

/// Class group codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ClassGroup {
    Housing = 0x02,
    Management = 0x05,
}

/// Class code of the controller in the management group.
pub const CLASS_CONTROLLER: u8 = 0xFF;

/// Class code of the low-voltage smart meter in the housing group.
pub const CLASS_LOW_VOLTAGE_SMART_METER: u8 = 0x88;

/// ECHONET object identifier (EOJ): class group, class, instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectId {
    pub class_group: u8,
    pub class_code: u8,
    pub instance: u8,
}

impl ObjectId {
    /// Home controller, the side this crate speaks for.
    pub const CONTROLLER: ObjectId = ObjectId::new(ClassGroup::Management as u8, CLASS_CONTROLLER);

    /// The meter on the other end of the B-route.
    pub const SMART_METER: ObjectId =
        ObjectId::new(ClassGroup::Housing as u8, CLASS_LOW_VOLTAGE_SMART_METER);

    /// Object with instance 1.
    pub const fn new(class_group: u8, class_code: u8) -> Self {
        Self::with_instance(class_group, class_code, 0x01)
    }

    pub const fn with_instance(class_group: u8, class_code: u8, instance: u8) -> Self {
        ObjectId {
            class_group,
            class_code,
            instance,
        }
    }

    /// Pack into the low 24 bits, big-endian order.
    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes([0, self.class_group, self.class_code, self.instance])
    }

    /// Unpack from the low 24 bits; the top byte is ignored.
    pub fn from_u32(value: u32) -> Self {
        let [_, group, class, instance] = value.to_be_bytes();
        Self::with_instance(group, class, instance)
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.class_group, self.class_code, self.instance]
    }
}

impl From<[u8; 3]> for ObjectId {
    fn from(b: [u8; 3]) -> Self {
        ObjectId::with_instance(b[0], b[1], b[2])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.class_group, self.class_code, self.instance)
    }
}
