//! Fuzz target: `parse_w1_payload`
//!
//! Feeds arbitrary text to the 1-Wire payload parser.  It must never
//! panic, and any value it accepts must be a finite temperature that the
//! Fahrenheit conversion can handle.
//!
//! cargo fuzz run fuzz_probe_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use spactl::sensors::temperature::{celsius_to_fahrenheit, parse_w1_payload};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(celsius) = parse_w1_payload(raw) {
        assert!(celsius.is_finite(), "parser returned a non-finite value");
        assert!(celsius_to_fahrenheit(celsius).is_finite());
    }
});
