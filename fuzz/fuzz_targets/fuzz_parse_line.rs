#![no_main]

use broute_rs::skstack::{ScanCollector, SkLine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let _ = SkLine::parse(&line);

    let mut collector = ScanCollector::new();
    for field in line.split('\n') {
        collector.accept(field);
    }
    let _ = collector.finish();
});
