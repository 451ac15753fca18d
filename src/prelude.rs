//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use freefall_guard::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{FfgError, Result};

// Device
pub use crate::device::controller::{DeviceHandle, SysfsDevice};
pub use crate::device::environment::SysfsEnvironment;
pub use crate::device::{DeviceControl, EnvironmentProbe};

// Event source
pub use crate::source::freefall::{
    EventSource, FreefallStream, Interrupt, ProtectionEvent, ShutdownCause, SourceRead,
};

// Protection
pub use crate::protection::machine::{ProtectionMachine, ProtectionState, Transition};
pub use crate::protection::policy::ProtectionPolicy;

// Daemon
pub use crate::daemon::lifecycle::ProtectionSession;
pub use crate::daemon::loop_main::FreefallDaemon;
