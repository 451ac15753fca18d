//! Device control and environment sensing over OS-exposed control surfaces.
//!
//! The protection loop only talks to the traits below, so the sysfs-backed
//! implementations can be swapped for in-memory doubles.

pub mod controller;
pub mod environment;

use std::sync::Arc;

use crate::core::errors::Result;

/// Protect/unprotect and indicator commands against one storage device.
pub trait DeviceControl {
    /// Park the heads for `seconds`; `0` unparks immediately.
    fn set_parked(&self, seconds: u32) -> Result<()>;
    /// Switch the protection indicator on or off.
    fn set_indicator(&self, on: bool) -> Result<()>;
}

/// Point-in-time readings that pick the protection window.
///
/// Implementations resolve read failures internally (fail-open) and never
/// surface them to the caller.
pub trait EnvironmentProbe {
    /// Whether the machine runs on external power.
    fn on_external_power(&self) -> bool;
    /// Whether the lid is open.
    fn is_lid_open(&self) -> bool;
}

impl<T: DeviceControl + ?Sized> DeviceControl for Arc<T> {
    fn set_parked(&self, seconds: u32) -> Result<()> {
        (**self).set_parked(seconds)
    }

    fn set_indicator(&self, on: bool) -> Result<()> {
        (**self).set_indicator(on)
    }
}

impl<T: EnvironmentProbe + ?Sized> EnvironmentProbe for Arc<T> {
    fn on_external_power(&self) -> bool {
        (**self).on_external_power()
    }

    fn is_lid_open(&self) -> bool {
        (**self).is_lid_open()
    }
}
