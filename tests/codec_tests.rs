//! Integration tests for the ECHONET Lite frame codec and the smart meter
//! property decoding.

use broute_rs::echonet::frame::{encode_request, power_request, validate_header, Edata, FrameFormat, Payload};
use broute_rs::echonet::smart_meter::{decode_measurements, energy_unit, unit_multiplier, Direction, MeterTimestamp};
use broute_rs::{decode_frame_hex, BrouteError, Frame, Measurement, ObjectId, Property, PropertyCode, ServiceCode};
use proptest::prelude::*;

fn meter_response(properties: Vec<Property>) -> Frame {
    Frame::new(
        1,
        Edata {
            source: ObjectId::SMART_METER,
            dest: ObjectId::CONTROLLER,
            service: ServiceCode::ReadResponse.into(),
            properties,
        },
    )
}

/// Tests that the power request decodes back to a read of E1, E0, E7.
#[test]
fn test_power_request_decodes() {
    let frame = Frame::decode(&power_request().unwrap()).unwrap();
    assert_eq!(frame.format, FrameFormat::Specified);
    assert_eq!(frame.transaction_id, 1);
    let edata = frame.edata().unwrap();
    assert_eq!(edata.source, ObjectId::CONTROLLER);
    assert_eq!(edata.dest, ObjectId::SMART_METER);
    assert_eq!(edata.service_code(), Some(ServiceCode::Read));
    let codes: Vec<u8> = edata.properties.iter().map(Property::code).collect();
    assert_eq!(codes, vec![0xE1, 0xE0, 0xE7]);
    assert!(edata.properties.iter().all(Property::is_empty));
}

/// Tests that the protocol type is checked before the format.
#[test]
fn test_header_validation_order() {
    assert!(matches!(validate_header(0x20, 0x99), Err(BrouteError::InvalidProtocolType(0x20))));
    assert!(matches!(validate_header(0x10, 0x99), Err(BrouteError::InvalidFormat(0x99))));
    assert_eq!(validate_header(0x10, 0x81).unwrap(), FrameFormat::Specified);
    assert_eq!(validate_header(0x10, 0x82).unwrap(), FrameFormat::Arbitrary);
}

/// Tests that a FORMAT2 frame keeps its body undecoded.
#[test]
fn test_arbitrary_format_body() {
    let frame = Frame::decode(&[0x10, 0x82, 0x12, 0x34, 0xAA, 0xBB]).unwrap();
    assert_eq!(frame.transaction_id, 0x1234);
    assert_eq!(frame.payload, Payload::Arbitrary(vec![0xAA, 0xBB]));
    assert!(frame.properties().is_empty());
    assert_eq!(frame.encode().unwrap(), vec![0x10, 0x82, 0x12, 0x34, 0xAA, 0xBB]);
}

/// Tests that an instantaneous power of 500 W is decoded.
#[test]
fn test_instantaneous_power() {
    let (_, measurements) = decode_frame_hex("1081000102880105FF017201E704000001F4").unwrap();
    assert_eq!(measurements, vec![Measurement::InstantaneousPower { watts: 500 }]);
}

/// Tests that the energy unit from 0xE1 scales the cumulative value of the same frame.
#[test]
fn test_cumulative_energy_with_unit() {
    let frame = meter_response(vec![
        Property::new(0xE1, Some(vec![0x02])),
        Property::new(0xE0, Some(vec![0x00, 0x01, 0xE2, 0x40])),
        Property::new(0xE3, Some(vec![0x00, 0x00, 0x00, 0x64])),
    ]);
    let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
    assert_eq!(
        decode_measurements(&decoded),
        vec![
            Measurement::CumulativeEnergy {
                direction: Direction::Forward,
                kwh: 1234.6,
            },
            Measurement::CumulativeEnergy {
                direction: Direction::Reverse,
                kwh: 1.0,
            },
        ]
    );
}

/// Tests that a missing or unknown unit falls back to 0.1 kWh.
#[test]
fn test_energy_unit_fallback() {
    assert_eq!(energy_unit(&[]), 0.1);
    assert_eq!(energy_unit(&[Property::new(0xE1, Some(vec![0x05]))]), 0.1);
    assert_eq!(energy_unit(&[Property::new(0xE1, None)]), 0.1);
    assert_eq!(energy_unit(&[Property::new(0xE1, Some(vec![0x0A]))]), 10.0);
    assert_eq!(unit_multiplier(0x00), Some(1.0));
    assert_eq!(unit_multiplier(0x04), Some(0.0001));
    assert_eq!(unit_multiplier(0x0D), Some(10000.0));
    assert_eq!(unit_multiplier(0x05), None);
}

/// Tests that the unit codes 0x01 and 0x0D scale cumulative energy end to end.
#[test]
fn test_energy_unit_scales_measurements() {
    let tenths = meter_response(vec![
        Property::new(0xE1, Some(vec![0x01])),
        Property::new(0xE0, Some(vec![0x00, 0x00, 0x00, 0x64])),
    ]);
    assert_eq!(energy_unit(tenths.properties()), 0.1);
    assert_eq!(
        decode_measurements(&tenths),
        vec![Measurement::CumulativeEnergy {
            direction: Direction::Forward,
            kwh: 10.0,
        }]
    );

    let ten_thousands = meter_response(vec![
        Property::new(0xE1, Some(vec![0x0D])),
        Property::new(0xE3, Some(vec![0x00, 0x00, 0x00, 0x07])),
    ]);
    assert_eq!(energy_unit(ten_thousands.properties()), 10000.0);
    assert_eq!(
        decode_measurements(&ten_thousands),
        vec![Measurement::CumulativeEnergy {
            direction: Direction::Reverse,
            kwh: 70000.0,
        }]
    );
}

/// Tests the 12-byte snapshot `07E8 03 15 0C 1E 00 00000003E8` with the default unit.
#[test]
fn test_snapshot_with_four_byte_value() {
    let data = vec![0x07, 0xE8, 0x03, 0x15, 0x0C, 0x1E, 0x00, 0x00, 0x00, 0x03, 0xE8];
    let frame = meter_response(vec![Property::new(0xEA, Some(data))]);
    match decode_measurements(&frame).as_slice() {
        [Measurement::CumulativeEnergySnapshot {
            direction: Direction::Forward,
            kwh,
            timestamp,
        }] => {
            assert_eq!(*kwh, 100.0);
            assert_eq!(timestamp.to_string(), "2024-03-21 12:30:00");
            assert!(timestamp.to_naive().is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

/// Tests that a fixed-time snapshot decodes its timestamp and value.
#[test]
fn test_fixed_time_snapshot() {
    let frame = meter_response(vec![Property::new(
        0xEA,
        Some(vec![0x07, 0xE8, 0x03, 0x0F, 0x0C, 0x1E, 0x00, 0x00, 0x00, 0x30, 0x39]),
    )]);
    match decode_measurements(&frame).as_slice() {
        [Measurement::CumulativeEnergySnapshot {
            direction,
            kwh,
            timestamp,
        }] => {
            assert_eq!(*direction, Direction::Forward);
            assert_eq!(*kwh, 1234.5);
            assert_eq!(
                *timestamp,
                MeterTimestamp {
                    year: 2024,
                    month: 3,
                    day: 15,
                    hour: 12,
                    minute: 30,
                    second: 0
                }
            );
            assert_eq!(timestamp.to_string(), "2024-03-15 12:30:00");
        }
        other => panic!("unexpected {other:?}"),
    }
}

/// Tests that a too-short snapshot is skipped without affecting the other properties.
#[test]
fn test_short_snapshot_is_skipped() {
    let frame = meter_response(vec![
        Property::new(0xE7, Some(vec![0x00, 0x00, 0x00, 0x0A])),
        Property::new(0xEB, Some(vec![0x07, 0xE8, 0x03])),
    ]);
    assert_eq!(
        decode_measurements(&frame),
        vec![Measurement::InstantaneousPower { watts: 10 }]
    );
}

/// Tests that measurements come out in fixed order regardless of property order.
#[test]
fn test_measurement_order() {
    let frame = meter_response(vec![
        Property::new(0xE3, Some(vec![0, 0, 0, 1])),
        Property::new(0xE7, Some(vec![0, 0, 0, 2])),
        Property::new(0xE0, Some(vec![0, 0, 0, 3])),
    ]);
    let kinds: Vec<String> = decode_measurements(&frame)
        .iter()
        .map(|m| m.to_string().split(':').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "instantaneous power",
            "cumulative energy (forward)",
            "cumulative energy (reverse)"
        ]
    );
}

/// Tests that non-hex input is reported as an error.
#[test]
fn test_decode_invalid_hex() {
    assert!(decode_frame_hex("10 8").is_err());
    assert!(decode_frame_hex("ZZ").is_err());
}

/// Tests that requests with more than 255 properties are rejected.
#[test]
fn test_too_many_properties() {
    let properties = (0..256).map(|_| Property::request(PropertyCode::InstantaneousPower)).collect();
    assert!(matches!(
        encode_request(ServiceCode::Read, properties),
        Err(BrouteError::TooManyProperties(256))
    ));
}

/// Tests that a frame with 255 properties survives encode and decode.
#[test]
fn test_roundtrip_max_properties() {
    let properties: Vec<Property> = (0..=254u8).map(|code| Property::new(code, Some(vec![code]))).collect();
    let frame = meter_response(properties);
    let bytes = frame.encode().unwrap();
    assert_eq!(bytes[11], 255);
    let decoded = Frame::decode(&bytes).unwrap();
    assert_eq!(decoded.properties().len(), 255);
    assert_eq!(decoded, frame);
}

/// Tests that a property with 255 data bytes survives encode and decode.
#[test]
fn test_roundtrip_max_property_length() {
    let data: Vec<u8> = (0..=254u8).collect();
    let frame = meter_response(vec![Property::new(0xEA, Some(data))]);
    let bytes = frame.encode().unwrap();
    assert_eq!(bytes[13], 255);
    let decoded = Frame::decode(&bytes).unwrap();
    assert_eq!(decoded.properties()[0].len(), 255);
    assert_eq!(decoded, frame);
}

fn arb_property() -> impl Strategy<Value = Property> {
    (any::<u8>(), prop::collection::vec(any::<u8>(), 0..=255)).prop_map(|(code, data)| Property::new(code, Some(data)))
}

fn is_valid_header(protocol_type: u8, format: u8) -> bool {
    protocol_type == 0x10 && (format == 0x81 || format == 0x82)
}

proptest! {
    /// Tests that any well-formed FORMAT1 frame survives encode and decode.
    #[test]
    fn prop_frame_roundtrip(
        tid in any::<u16>(),
        source in any::<[u8; 3]>(),
        dest in any::<[u8; 3]>(),
        service in any::<u8>(),
        properties in prop::collection::vec(arb_property(), 0..=255),
    ) {
        let frame = Frame::new(tid, Edata {
            source: ObjectId::from(source),
            dest: ObjectId::from(dest),
            service,
            properties,
        });
        let bytes = frame.encode().unwrap();
        prop_assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    /// Tests that every header byte pair outside 0x10 / {0x81, 0x82} is rejected,
    /// protocol type first.
    #[test]
    fn prop_header_validation((protocol_type, format) in any::<(u8, u8)>()) {
        let result = validate_header(protocol_type, format);
        if protocol_type != 0x10 {
            prop_assert!(matches!(result, Err(BrouteError::InvalidProtocolType(pt)) if pt == protocol_type));
        } else if !is_valid_header(protocol_type, format) {
            prop_assert!(matches!(result, Err(BrouteError::InvalidFormat(f)) if f == format));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// Tests that frames with an invalid header fail to decode whatever follows.
    #[test]
    fn prop_decode_rejects_invalid_header(
        (protocol_type, format) in any::<(u8, u8)>(),
        rest in prop::collection::vec(any::<u8>(), 2..64),
    ) {
        let mut bytes = vec![protocol_type, format];
        bytes.extend_from_slice(&rest);
        let result = Frame::decode(&bytes);
        if protocol_type != 0x10 {
            prop_assert!(matches!(result, Err(BrouteError::InvalidProtocolType(_))));
        } else if !is_valid_header(protocol_type, format) {
            prop_assert!(matches!(result, Err(BrouteError::InvalidFormat(_))));
        }
    }

    /// Tests that the decoder never panics on arbitrary input.
    #[test]
    fn prop_decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = Frame::decode(&bytes);
    }
}
