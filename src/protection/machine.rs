//! Freefall-response state machine: `Idle` ⇄ `Protecting`.
//!
//! Transitions:
//! - any event → `Protecting`: park command, indicator on, deadline re-armed
//!   from the event's timestamp (a repeat event replaces the deadline, it
//!   never stacks, and the park command is reissued to refresh the drive's
//!   own timer)
//! - deadline reached while `Protecting` → `Idle`: unpark, indicator off
//! - [`ProtectionMachine::release`] → `Idle` unconditionally (cleanup path)
//!
//! The machine holds the only deadline, so at most one is armed at a time.
//! It never logs; every transition is returned to the caller, including any
//! control-surface failure, which never blocks the state change.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use crate::core::errors::Result;
use crate::device::{DeviceControl, EnvironmentProbe};
use crate::protection::policy::ProtectionPolicy;
use crate::source::freefall::ProtectionEvent;

/// Current protection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    /// Heads unparked, indicator off.
    Idle,
    /// Heads parked, indicator on, until `deadline` unless re-armed.
    Protecting { since: Instant, deadline: Instant },
}

/// Environment readings taken when a window was chosen.
///
/// `lid_open` is `None` when external power alone decided the window and the
/// lid surface was not read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentReading {
    pub on_external_power: bool,
    pub lid_open: Option<bool>,
}

/// What a call into the machine did.
#[derive(Debug)]
pub enum Transition {
    Protected {
        event: ProtectionEvent,
        window: Duration,
        reading: EnvironmentReading,
        /// The machine was already protecting; the old deadline was replaced.
        rearmed: bool,
        park: Result<()>,
        indicator: Result<()>,
    },
    Unprotected {
        protected_for: Duration,
        park: Result<()>,
        indicator: Result<()>,
    },
    /// Spurious wake-up: nothing was due.
    Unchanged,
}

/// Outcome of the unconditional cleanup.
#[derive(Debug)]
pub struct Release {
    pub was_protecting: bool,
    pub park: Result<()>,
    pub indicator: Result<()>,
}

impl Release {
    pub fn is_clean(&self) -> bool {
        self.park.is_ok() && self.indicator.is_ok()
    }
}

pub struct ProtectionMachine<D, E> {
    device: D,
    environment: E,
    policy: ProtectionPolicy,
    state: ProtectionState,
    events_seen: u64,
}

impl<D: DeviceControl, E: EnvironmentProbe> ProtectionMachine<D, E> {
    pub fn new(device: D, environment: E, policy: ProtectionPolicy) -> Self {
        Self {
            device,
            environment,
            policy,
            state: ProtectionState::Idle,
            events_seen: 0,
        }
    }

    pub fn state(&self) -> ProtectionState {
        self.state
    }

    /// The armed deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ProtectionState::Idle => None,
            ProtectionState::Protecting { deadline, .. } => Some(deadline),
        }
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Protect (or keep protecting) in response to a freefall notification.
    pub fn on_event(&mut self, event: ProtectionEvent, now: Instant) -> Transition {
        self.events_seen += 1;

        // Heads first: everything else can wait a few microseconds.
        let park = self.device.set_parked(self.policy.park_seconds);
        let indicator = self.device.set_indicator(true);

        let reading = self.read_environment();
        let window = self
            .policy
            .select_window(reading.on_external_power, reading.lid_open.unwrap_or(false));

        let (rearmed, since) = match self.state {
            ProtectionState::Idle => (false, now),
            ProtectionState::Protecting { since, .. } => (true, since),
        };
        self.state = ProtectionState::Protecting {
            since,
            deadline: now + window,
        };

        Transition::Protected {
            event,
            window,
            reading,
            rearmed,
            park,
            indicator,
        }
    }

    /// Unprotect if the armed deadline has been reached.
    pub fn on_deadline(&mut self, now: Instant) -> Transition {
        match self.state {
            ProtectionState::Protecting { since, deadline } if now >= deadline => {
                let park = self.device.set_parked(0);
                let indicator = self.device.set_indicator(false);
                self.state = ProtectionState::Idle;
                Transition::Unprotected {
                    protected_for: now.saturating_duration_since(since),
                    park,
                    indicator,
                }
            }
            _ => Transition::Unchanged,
        }
    }

    /// Unpark and switch the indicator off regardless of state.
    ///
    /// The unpark is attempted even if every earlier write failed.
    pub fn release(&mut self) -> Release {
        let was_protecting = matches!(self.state, ProtectionState::Protecting { .. });
        let park = self.device.set_parked(0);
        let indicator = self.device.set_indicator(false);
        self.state = ProtectionState::Idle;
        Release {
            was_protecting,
            park,
            indicator,
        }
    }

    fn read_environment(&self) -> EnvironmentReading {
        let on_external_power = self.environment.on_external_power();
        let lid_open = if on_external_power {
            None
        } else {
            Some(self.environment.is_lid_open())
        };
        EnvironmentReading {
            on_external_power,
            lid_open,
        }
    }
}
