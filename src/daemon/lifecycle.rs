//! Protection session: the cleanup guarantee around the state machine.
//!
//! Once a session exists, the heads are unparked and the indicator switched
//! off exactly once before the session goes away, whether through
//! [`ProtectionSession::finish`], an early error return or an unwinding panic.

#![allow(missing_docs)]

use crate::device::{DeviceControl, EnvironmentProbe};
use crate::protection::machine::{ProtectionMachine, Release};

pub struct ProtectionSession<D: DeviceControl, E: EnvironmentProbe> {
    machine: ProtectionMachine<D, E>,
    released: bool,
}

impl<D: DeviceControl, E: EnvironmentProbe> ProtectionSession<D, E> {
    pub fn new(machine: ProtectionMachine<D, E>) -> Self {
        Self {
            machine,
            released: false,
        }
    }

    pub fn machine(&self) -> &ProtectionMachine<D, E> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut ProtectionMachine<D, E> {
        &mut self.machine
    }

    /// Unpark and clear the indicator. `None` if this already happened.
    pub fn finish(&mut self) -> Option<Release> {
        if self.released {
            return None;
        }
        self.released = true;
        Some(self.machine.release())
    }
}

impl<D: DeviceControl, E: EnvironmentProbe> Drop for ProtectionSession<D, E> {
    fn drop(&mut self) {
        if let Some(release) = self.finish() {
            report_release(&release);
        }
    }
}

/// Print cleanup failures. Cleanup itself never fails the caller.
pub fn report_release(release: &Release) {
    if let Err(e) = &release.park {
        eprintln!("[FFG-DEVICE] failed to unpark heads during cleanup: {e}");
    }
    if let Err(e) = &release.indicator {
        eprintln!("[FFG-DEVICE] failed to clear indicator during cleanup: {e}");
    }
}
