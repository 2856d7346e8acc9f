//! # ECHONET Lite Frame Codec
//!
//! Encodes request frames and decodes reply frames. Decoding is built on
//! `nom`: EHD1/EHD2 are validated as soon as two bytes are present, then
//! FORMAT1 frames have their EDATA (source/destination object, service,
//! property records) decoded. FORMAT2 frames are validated only; their body is kept as raw
//! bytes.
//!
//! ```text
//! | EHD1 | EHD2 | TID (2) | SEOJ (3) | DEOJ (3) | ESV | OPC | EPC PDC EDT... |
//! ```
//!
//! Every failure is an error value: a truncated buffer is reported as
//! [`BrouteError::MalformedFrame`], never as a partial frame.

use crate::constants::{ECHONET_FORMAT_1, ECHONET_FORMAT_2, ECHONET_PROTOCOL_TYPE};
use crate::echonet::codes::{ObjectId, PropertyCode, ServiceCode};
use crate::error::BrouteError;
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{be_u16, be_u8};
use nom::sequence::tuple;
use nom::IResult;
use serde::Serialize;

/// Transaction id used for every request; replies are not correlated.
pub const DEFAULT_TRANSACTION_ID: u16 = 0x0001;

/// One property record (EPC, PDC, EDT).
///
/// Empty data is stored as `None`, so `len() == 0` exactly when there is
/// no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    code: u8,
    data: Option<Vec<u8>>,
}

impl Property {
    pub fn new(code: u8, data: Option<Vec<u8>>) -> Self {
        Property {
            code,
            data: data.filter(|d| !d.is_empty()),
        }
    }

    /// A property named in a read request: code only.
    pub fn request(code: PropertyCode) -> Self {
        Property::new(code.into(), None)
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// PDC: number of data bytes.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

/// EHD2 message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameFormat {
    /// 0x81, decodable EDATA
    Specified,
    /// 0x82, opaque body
    Arbitrary,
}

impl FrameFormat {
    pub fn to_byte(self) -> u8 {
        match self {
            FrameFormat::Specified => ECHONET_FORMAT_1,
            FrameFormat::Arbitrary => ECHONET_FORMAT_2,
        }
    }
}

/// EDATA of a FORMAT1 frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edata {
    pub source: ObjectId,
    pub dest: ObjectId,
    pub service: u8,
    pub properties: Vec<Property>,
}

impl Edata {
    pub fn service_code(&self) -> Option<ServiceCode> {
        ServiceCode::try_from(self.service).ok()
    }

    /// First property carrying `code`.
    pub fn find(&self, code: u8) -> Option<&Property> {
        self.properties.iter().find(|p| p.code == code)
    }
}

/// Body of a frame, depending on its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    Specified(Edata),
    Arbitrary(Vec<u8>),
}

/// A complete ECHONET Lite frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub protocol_type: u8,
    pub format: FrameFormat,
    pub transaction_id: u16,
    pub payload: Payload,
}

impl Frame {
    /// FORMAT1 frame around the given EDATA.
    pub fn new(transaction_id: u16, edata: Edata) -> Self {
        Frame {
            protocol_type: ECHONET_PROTOCOL_TYPE,
            format: FrameFormat::Specified,
            transaction_id,
            payload: Payload::Specified(edata),
        }
    }

    pub fn edata(&self) -> Option<&Edata> {
        match &self.payload {
            Payload::Specified(edata) => Some(edata),
            Payload::Arbitrary(_) => None,
        }
    }

    /// Decoded properties; empty for FORMAT2 frames.
    pub fn properties(&self) -> &[Property] {
        self.edata().map_or(&[], |e| e.properties.as_slice())
    }

    /// Serialize the frame to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, BrouteError> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(self.protocol_type);
        buf.put_u8(self.format.to_byte());
        buf.put_u16(self.transaction_id);

        match &self.payload {
            Payload::Arbitrary(body) => buf.put_slice(body),
            Payload::Specified(edata) => {
                let opc = u8::try_from(edata.properties.len())
                    .map_err(|_| BrouteError::TooManyProperties(edata.properties.len()))?;
                buf.put_slice(&edata.source.to_bytes());
                buf.put_slice(&edata.dest.to_bytes());
                buf.put_u8(edata.service);
                buf.put_u8(opc);
                for prop in &edata.properties {
                    let pdc = u8::try_from(prop.len()).map_err(|_| BrouteError::PropertyTooLong {
                        code: prop.code,
                        len: prop.len(),
                    })?;
                    buf.put_u8(prop.code);
                    buf.put_u8(pdc);
                    if let Some(data) = prop.data() {
                        buf.put_slice(data);
                    }
                }
            }
        }

        Ok(buf.to_vec())
    }

    /// Parse and validate a frame received from the meter.
    pub fn decode(input: &[u8]) -> Result<Frame, BrouteError> {
        let (rest, (protocol_type, format)) = parse_ehd(input).map_err(malformed)?;
        let format = validate_header(protocol_type, format)?;
        let (rest, transaction_id) = parse_tid(rest).map_err(malformed)?;

        let payload = match format {
            FrameFormat::Specified => {
                let (_, edata) = parse_edata(rest).map_err(malformed)?;
                Payload::Specified(edata)
            }
            FrameFormat::Arbitrary => Payload::Arbitrary(rest.to_vec()),
        };

        Ok(Frame {
            protocol_type,
            format,
            transaction_id,
            payload,
        })
    }
}

/// Check EHD1/EHD2. Protocol type is checked first.
pub fn validate_header(protocol_type: u8, format: u8) -> Result<FrameFormat, BrouteError> {
    if protocol_type != ECHONET_PROTOCOL_TYPE {
        return Err(BrouteError::InvalidProtocolType(protocol_type));
    }
    match format {
        ECHONET_FORMAT_1 => Ok(FrameFormat::Specified),
        ECHONET_FORMAT_2 => Ok(FrameFormat::Arbitrary),
        other => Err(BrouteError::InvalidFormat(other)),
    }
}

/// Encode a controller → smart meter request.
pub fn encode_request(service: ServiceCode, properties: Vec<Property>) -> Result<Vec<u8>, BrouteError> {
    Frame::new(
        DEFAULT_TRANSACTION_ID,
        Edata {
            source: ObjectId::CONTROLLER,
            dest: ObjectId::SMART_METER,
            service: service.into(),
            properties,
        },
    )
    .encode()
}

/// The periodic telemetry request: energy unit, forward cumulative energy
/// and instantaneous power.
pub fn power_request() -> Result<Vec<u8>, BrouteError> {
    encode_request(
        ServiceCode::Read,
        vec![
            Property::request(PropertyCode::CumulativeEnergyUnit),
            Property::request(PropertyCode::CumulativeEnergyForward),
            Property::request(PropertyCode::InstantaneousPower),
        ],
    )
}

fn parse_ehd(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    tuple((be_u8, be_u8))(input)
}

fn parse_tid(input: &[u8]) -> IResult<&[u8], u16> {
    be_u16(input)
}

fn parse_object_id(input: &[u8]) -> IResult<&[u8], ObjectId> {
    let (input, (group, class, instance)) = tuple((be_u8, be_u8, be_u8))(input)?;
    Ok((input, ObjectId::with_instance(group, class, instance)))
}

fn parse_property(input: &[u8]) -> IResult<&[u8], Property> {
    let (input, (code, pdc)) = tuple((be_u8, be_u8))(input)?;
    let (input, data) = take(pdc)(input)?;
    Ok((input, Property::new(code, Some(data.to_vec()))))
}

fn parse_edata(input: &[u8]) -> IResult<&[u8], Edata> {
    let (input, (source, dest, service, opc)) =
        tuple((parse_object_id, parse_object_id, be_u8, be_u8))(input)?;
    let (input, properties) = count(parse_property, opc as usize)(input)?;
    Ok((
        input,
        Edata {
            source,
            dest,
            service,
            properties,
        },
    ))
}

fn malformed(err: nom::Err<nom::error::Error<&[u8]>>) -> BrouteError {
    match err {
        nom::Err::Incomplete(_) => BrouteError::MalformedFrame("incomplete frame".into()),
        nom::Err::Error(e) | nom::Err::Failure(e) => BrouteError::MalformedFrame(format!(
            "{:?} with {} bytes left",
            e.code,
            e.input.len()
        )),
    }
}
