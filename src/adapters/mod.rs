//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements            | Connects to                    |
//! |---------------|-----------------------|--------------------------------|
//! | `hardware`    | RelayPort, SensorPort | sysfs GPIO relays, flow switch |
//! |               | ClockPort, DelayNs    | 1-Wire bus, host clock         |
//! | `time`        | ClockPort             | `Instant` + local wall clock   |
//! | `log_sink`    | EventSink             | `log` facade                   |
//! | `alert`       | EventSink, AlertPort  | log or external command        |
//! | `config_file` | ConfigPort            | JSON file                      |

pub mod alert;
pub mod config_file;
pub mod hardware;
pub mod log_sink;
pub mod time;
