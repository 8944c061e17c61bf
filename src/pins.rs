//! GPIO line assignments for the spa relay board.
//!
//! Single source of truth for the factory wiring.  The daemon config can
//! override any line; these are the defaults it falls back to.

// ---------------------------------------------------------------------------
// Relay outputs (8-channel board + 2-channel expansion)
// ---------------------------------------------------------------------------

pub const HEATER_GPIO: u32 = 17;
pub const CIRC_PUMP_GPIO: u32 = 27;
pub const BLOWER_GPIO: u32 = 22;
pub const FANS_GPIO: u32 = 23;
pub const LIGHT_GPIO: u32 = 24;
pub const OZONE_GPIO: u32 = 25;
pub const PUMP1_LOW_GPIO: u32 = 5;
pub const PUMP1_HIGH_GPIO: u32 = 6;
pub const PUMP2_LOW_GPIO: u32 = 13;
pub const PUMP2_HIGH_GPIO: u32 = 19;

/// The relay board energises a channel when its input is pulled LOW.
pub const RELAY_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Paddle flow switch.  Closed (flow) pulls the line HIGH.
pub const FLOW_SWITCH_GPIO: u32 = 26;
pub const FLOW_ACTIVE_LOW: bool = false;

/// 1-Wire bus (DS18B20 probes) is owned by the kernel `w1-gpio` overlay on
/// GPIO 4; probes are reached through sysfs.
pub const W1_SYSFS_ROOT: &str = "/sys/bus/w1/devices";
