//! Fuzz target: operator command parsing
//!
//! Splits the input into a device name and a state and runs every parsing
//! constructor.  Anything accepted must name a known device, and that
//! device's canonical name must parse back to it.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use spactl::app::commands::SpaCommand;
use spactl::devices::DeviceId;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let (device, state) = text.split_once(' ').unwrap_or((&text, ""));

    if let Ok(cmd) = SpaCommand::set_state(device, state) {
        assert!(device.parse::<DeviceId>().is_ok());
        assert!(matches!(cmd, SpaCommand::SetSwitch(..) | SpaCommand::SetPump(..)));
    }
    if let Ok(SpaCommand::Toggle(id)) = SpaCommand::toggle(device) {
        assert_eq!(id.name().parse::<DeviceId>().ok(), Some(id));
    }
    let _ = SpaCommand::set_mode(state);
});
