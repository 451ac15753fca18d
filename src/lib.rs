#![forbid(unsafe_code)]

//! Freefall Guard (ffg): parks hard-disk heads when an accelerometer reports
//! that the machine is falling.
//!
//! The daemon waits on a freefall event stream. Each notification parks the
//! heads of one block device and lights the protection LED; after a quiet
//! window (short when the machine looks attended, long when it is on battery
//! with the lid shut) the heads are unparked again.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use freefall_guard::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use freefall_guard::core::config::Config;
//! use freefall_guard::protection::machine::ProtectionMachine;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod device;
pub mod logger;
pub mod protection;
pub mod source;
