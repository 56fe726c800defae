//! servolink - joystick-driven servo control over UDP
//!
//! The host reads joystick axes and sends complete channel snapshots; the
//! target converts them to pulse widths and drives servo pins from a
//! dedicated scheduler thread.

pub mod cli;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod host;
pub mod pulse;
pub mod rate_limit;
pub mod snapshot;
pub mod target;
pub mod transport;
