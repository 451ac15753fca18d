//! Main protection loop.
//!
//! Single-threaded over the state machine: the loop alternates between one
//! blocking wait on the [`EventSource`] (event, deadline or shutdown, whichever
//! comes first) and one transition. Helper threads only feed channels:
//! - **Reader thread** (`ffg-freefall`): blocking reads on the event stream
//! - **Signal thread** (`ffg-signals`): termination signals → shutdown channel
//! - **Logger thread** (`ffg-logger`): JSONL activity log
//!
//! Exit paths all go through [`ProtectionSession::finish`], so the heads are
//! unparked and the indicator cleared before [`FreefallDaemon::run`] returns.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use crate::core::errors::{FfgError, Result};
use crate::daemon::lifecycle::ProtectionSession;
use crate::device::{DeviceControl, EnvironmentProbe};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::protection::machine::{Release, Transition};
use crate::source::freefall::{EventSource, Interrupt, ShutdownCause, SourceRead};

pub struct FreefallDaemon<D: DeviceControl, E: EnvironmentProbe> {
    session: ProtectionSession<D, E>,
    source: EventSource,
    activity: ActivityLoggerHandle,
    device_name: String,
    started: Instant,
}

impl<D: DeviceControl, E: EnvironmentProbe> FreefallDaemon<D, E> {
    pub fn new(
        session: ProtectionSession<D, E>,
        source: EventSource,
        activity: ActivityLoggerHandle,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            session,
            source,
            activity,
            device_name: device_name.into(),
            started: Instant::now(),
        }
    }

    /// Run until a shutdown request or a fatal event-stream failure, then
    /// release the device.
    ///
    /// Returns the shutdown cause on a clean stop. The release happens on
    /// both paths and its failures are reported, never returned.
    pub fn run(mut self) -> Result<ShutdownCause> {
        eprintln!(
            "[FFG-DAEMON] protecting {} (events from {})",
            self.device_name,
            self.source.path().display()
        );

        let outcome = self.event_loop();

        if let Some(release) = self.session.finish() {
            self.record_release(&release);
        }

        let reason = match &outcome {
            Ok(cause) => describe_cause(*cause),
            Err(e) => {
                self.activity.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                if e.is_fatal_to_loop() {
                    "event-source-lost".to_string()
                } else {
                    "error".to_string()
                }
            }
        };
        let events_seen = self.session.machine().events_seen();
        let uptime_secs = self.started.elapsed().as_secs();
        eprintln!("[FFG-DAEMON] stopped: {reason} (uptime={uptime_secs}s events={events_seen})");
        self.activity.send(ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
            events_seen,
        });

        outcome
    }

    fn event_loop(&mut self) -> Result<ShutdownCause> {
        loop {
            let deadline = self.session.machine().deadline();
            match self.source.read_next(deadline)? {
                SourceRead::Event(event) => {
                    let transition = self.session.machine_mut().on_event(event, Instant::now());
                    self.record(transition);
                }
                SourceRead::Interrupted(Interrupt::DeadlineElapsed) => {
                    let transition = self.session.machine_mut().on_deadline(Instant::now());
                    self.record(transition);
                }
                SourceRead::Interrupted(Interrupt::Shutdown(cause)) => return Ok(cause),
            }
        }
    }

    fn record(&self, transition: Transition) {
        match transition {
            Transition::Protected {
                event,
                window,
                reading,
                rearmed,
                park,
                indicator,
            } => {
                if let Err(e) = park {
                    self.record_park_failure(self.session.machine().policy().park_seconds, &e);
                }
                if let Err(e) = indicator {
                    self.record_indicator_failure(true, &e);
                }
                let window_ms = millis(window);
                if !rearmed {
                    eprintln!(
                        "[FFG-DAEMON] freefall on {}: heads parked, window {window_ms}ms",
                        self.device_name
                    );
                }
                self.activity.send(ActivityEvent::Protected {
                    device: self.device_name.clone(),
                    count: event.count,
                    window_ms,
                    on_power: reading.on_external_power,
                    lid_open: reading.lid_open,
                    rearmed,
                });
            }
            Transition::Unprotected {
                protected_for,
                park,
                indicator,
            } => {
                if let Err(e) = park {
                    self.record_park_failure(0, &e);
                }
                if let Err(e) = indicator {
                    self.record_indicator_failure(false, &e);
                }
                let protected_ms = millis(protected_for);
                eprintln!(
                    "[FFG-DAEMON] {} unparked after {protected_ms}ms",
                    self.device_name
                );
                self.activity.send(ActivityEvent::Unprotected {
                    device: self.device_name.clone(),
                    protected_ms,
                });
            }
            Transition::Unchanged => {}
        }
    }

    fn record_release(&self, release: &Release) {
        if let Err(e) = &release.park {
            self.record_park_failure(0, e);
        }
        if let Err(e) = &release.indicator {
            self.record_indicator_failure(false, e);
        }
    }

    fn record_park_failure(&self, seconds: u32, error: &FfgError) {
        eprintln!("[FFG-DEVICE] head park command ({seconds}s) failed: {error}");
        self.activity.send(ActivityEvent::HeadParkFailed {
            device: self.device_name.clone(),
            seconds,
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }

    fn record_indicator_failure(&self, on: bool, error: &FfgError) {
        eprintln!("[FFG-DEVICE] indicator update failed: {error}");
        self.activity.send(ActivityEvent::IndicatorFailed {
            on,
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }
}

fn describe_cause(cause: ShutdownCause) -> String {
    match cause {
        ShutdownCause::Signal(signal) => format!("signal-{signal}"),
        ShutdownCause::Requested => "requested".to_string(),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
