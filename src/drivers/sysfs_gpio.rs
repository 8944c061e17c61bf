//! Linux sysfs GPIO lines as embedded-hal pins.
//!
//! Each line is exported under `<root>/gpio<N>` with a `direction` and a
//! `value` file.  Outputs are opened by writing `high`/`low` to
//! `direction`, which sets the initial level in the same step so a relay
//! never glitches on at startup.

use core::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use log::{debug, error};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub io::ErrorKind);

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sysfs gpio: {}", self.0)
    }
}

impl std::error::Error for GpioError {}

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<io::Error> for GpioError {
    fn from(e: io::Error) -> Self {
        Self(e.kind())
    }
}

/// One exported GPIO line.
#[derive(Debug)]
pub struct SysfsPin {
    line: u32,
    value: PathBuf,
}

impl SysfsPin {
    /// Export `line` as an output already driven to `initial_high`.
    pub fn output(root: &Path, line: u32, initial_high: bool) -> Result<Self, GpioError> {
        let dir = export(root, line)?;
        let direction = if initial_high { "high" } else { "low" };
        fs::write(dir.join("direction"), direction).inspect_err(|e| {
            error!("GPIO{line}: set direction failed: {e}");
        })?;
        debug!("GPIO{line}: output, initial {direction}");
        Ok(Self {
            line,
            value: dir.join("value"),
        })
    }

    /// Export `line` as an input.
    pub fn input(root: &Path, line: u32) -> Result<Self, GpioError> {
        let dir = export(root, line)?;
        fs::write(dir.join("direction"), "in").inspect_err(|e| {
            error!("GPIO{line}: set direction failed: {e}");
        })?;
        debug!("GPIO{line}: input");
        Ok(Self {
            line,
            value: dir.join("value"),
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn write_level(&mut self, high: bool) -> Result<(), GpioError> {
        fs::write(&self.value, if high { "1" } else { "0" })?;
        Ok(())
    }

    fn read_level(&mut self) -> Result<bool, GpioError> {
        match fs::read_to_string(&self.value)?.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(GpioError(io::ErrorKind::InvalidData)),
        }
    }
}

/// Make sure `<root>/gpio<line>` exists.
fn export(root: &Path, line: u32) -> Result<PathBuf, GpioError> {
    let dir = root.join(format!("gpio{line}"));
    if !dir.exists() {
        fs::write(root.join("export"), line.to_string()).inspect_err(|e| {
            error!("GPIO{line}: export failed: {e}");
        })?;
    }
    Ok(dir)
}

impl ErrorType for SysfsPin {
    type Error = GpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.read_level().map(|h| !h)
    }
}
