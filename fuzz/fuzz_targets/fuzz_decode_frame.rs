#![no_main]

use broute_rs::echonet::smart_meter::decode_measurements;
use broute_rs::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The decoder must reject malformed input with an error, never a panic
    if let Ok(frame) = Frame::decode(data) {
        let _ = decode_measurements(&frame);
        let _ = frame.encode();
    }

    // Force a valid header so the EDATA parser sees the input
    if data.len() > 4 {
        let mut framed = vec![0x10, 0x81];
        framed.extend_from_slice(data);
        let _ = Frame::decode(&framed);
    }
});
