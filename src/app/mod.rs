//! Application core.
//!
//! Business rules for the spa controller live in [`service`]; [`runtime`]
//! drives them on one thread and [`link`] is how other threads reach it.
//! All interaction with hardware happens through the port traits in
//! [`ports`], so the core runs unchanged against mock adapters.

pub mod commands;
pub mod events;
pub mod link;
pub mod ports;
pub mod runtime;
pub mod service;
