//! Spa controller library.
//!
//! Exposes the control core and its adapters for the daemon, integration
//! tests and fuzzing.  Hardware access is confined to [`adapters`] and
//! [`drivers`]; everything else runs against the port traits in
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod timers;
