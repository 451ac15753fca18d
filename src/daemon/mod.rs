//! Daemon subsystem: protection loop, cleanup guarantee, signal handling,
//! process tuning and detaching.

pub mod detach;
pub mod lifecycle;
pub mod loop_main;
#[cfg(feature = "daemon")]
pub mod signals;
pub mod tuning;
