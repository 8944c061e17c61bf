//! Linux peripheral drivers: sysfs GPIO lines and the 1-Wire bus.

pub mod sysfs_gpio;
pub mod w1;
