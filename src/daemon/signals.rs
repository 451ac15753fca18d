//! Termination signals: SIGTERM, SIGINT, SIGHUP and SIGQUIT all mean
//! "clean up and exit".
//!
//! Uses the `signal-hook` iterator on a dedicated `ffg-signals` thread, so no
//! work runs in signal context. Each intercepted signal is forwarded on a
//! crossbeam channel that the event source selects on.

#![allow(missing_docs)]

use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::source::freefall::ShutdownCause;

/// Signals that end the daemon.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGHUP, SIGQUIT];

/// Only the first request matters; later ones are dropped when full.
const SHUTDOWN_CHANNEL_CAP: usize = 4;

// ──────────────────── signal handler ────────────────────

/// Shutdown wake-up channel fed by the OS signal hooks.
#[derive(Clone)]
pub struct SignalHandler {
    tx: Sender<ShutdownCause>,
    rx: Receiver<ShutdownCause>,
}

impl SignalHandler {
    /// Create a handler and register the OS signal hooks.
    ///
    /// Registration is best-effort; failures are logged to stderr but not fatal.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    fn unregistered() -> Self {
        let (tx, rx) = bounded(SHUTDOWN_CHANNEL_CAP);
        Self { tx, rx }
    }

    /// Receiver that yields the cause of the first shutdown request.
    pub fn subscribe(&self) -> Receiver<ShutdownCause> {
        self.rx.clone()
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        notify(&self.tx, ShutdownCause::Requested);
    }

    fn register_signals(&self) {
        let mut signals = match Signals::new(TERMINATION_SIGNALS) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[FFG-SIGNAL] failed to register termination signals: {e}");
                return;
            }
        };

        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("ffg-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    notify(&tx, ShutdownCause::Signal(signal));
                }
            });
        if let Err(e) = spawned {
            eprintln!("[FFG-SIGNAL] failed to spawn signal thread: {e}");
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn notify(tx: &Sender<ShutdownCause>, cause: ShutdownCause) {
    let _ = tx.try_send(cause);
}

// ──────────────────── tests ────────────────────
