//! Linux 1-Wire bus (w1-gpio + w1-therm kernel drivers).
//!
//! Every probe on the bus shows up as `<root>/<address>/w1_slave`.  Reading
//! that file triggers a conversion and returns the two-line payload parsed
//! by [`parse_w1_payload`](crate::sensors::temperature::parse_w1_payload).

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, warn};

use crate::error::SensorError;

/// DS18B20 family code prefix.
const THERMOMETER_FAMILY: &str = "28-";

pub struct W1Bus {
    root: PathBuf,
}

impl W1Bus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw `w1_slave` contents for one probe.
    pub fn read_slave(&self, address: &str) -> Result<String, SensorError> {
        let path = self.root.join(address).join("w1_slave");
        fs::read_to_string(&path).map_err(|e| {
            error!("W1: read {} failed: {e}", path.display());
            SensorError::Io(e.kind())
        })
    }

    /// Thermometer addresses currently present on the bus, sorted.
    pub fn thermometers(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("W1: cannot list {}: {e}", self.root.display());
                return Vec::new();
            }
        };
        let mut found: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(THERMOMETER_FAMILY))
            .collect();
        found.sort();
        found
    }
}
