//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Everything else sends
//! [`ActivityEvent`]s over a bounded crossbeam channel; `try_send()` keeps the
//! protection loop from ever blocking on log back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{FfgError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 256;

// ──────────────────── public event type ────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        device: String,
        config_hash: String,
        /// Applied tuning steps, comma-separated, or `none`.
        tuning: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
        events_seen: u64,
    },
    Protected {
        device: String,
        count: u8,
        window_ms: u64,
        on_power: bool,
        lid_open: Option<bool>,
        rearmed: bool,
    },
    Unprotected {
        device: String,
        protected_ms: u64,
    },
    HeadParkFailed {
        device: String,
        seconds: u32,
        code: String,
        message: String,
    },
    IndicatorFailed {
        on: bool,
        code: String,
        message: String,
    },
    TuningDegraded {
        details: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cloneable, non-blocking handle onto the logger thread.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event; drops it (and counts the drop) when the channel is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and stop. Blocks only if the queue is full.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose events go nowhere, for callers that run without a log.
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until `shutdown()` or until every handle
/// has been dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let jsonl = config.jsonl;
    let join = thread::Builder::new()
        .name("ffg-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl, &dropped))
        .map_err(|e| FfgError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} activity events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
        // Protection events are rare; keep the file current for tailers.
        jsonl.flush();
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            device,
            config_hash,
            tuning,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.device = Some(device.clone());
            e.details = Some(format!(
                "version={version} config_hash={config_hash} tuning={tuning}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
            events_seen,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!(
                "reason={reason} uptime={uptime_secs}s events={events_seen}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::Protected {
            device,
            count,
            window_ms,
            on_power,
            lid_open,
            rearmed,
        } => {
            let mut e = LogEntry::new(EventType::Protect, Severity::Warning);
            e.device = Some(device.clone());
            e.count = Some(*count);
            e.window_ms = Some(*window_ms);
            e.on_power = Some(*on_power);
            e.lid_open = *lid_open;
            e.rearmed = Some(*rearmed);
            e
        }
        ActivityEvent::Unprotected {
            device,
            protected_ms,
        } => {
            let mut e = LogEntry::new(EventType::Unprotect, Severity::Info);
            e.device = Some(device.clone());
            e.duration_ms = Some(*protected_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::HeadParkFailed {
            device,
            seconds,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::HeadParkFailure, Severity::Critical);
            e.device = Some(device.clone());
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.details = Some(format!("park_seconds={seconds}"));
            e
        }
        ActivityEvent::IndicatorFailed { on, code, message } => {
            let mut e = LogEntry::new(EventType::IndicatorFailure, Severity::Warning);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.details = Some(format!("indicator={}", if *on { "on" } else { "off" }));
            e
        }
        ActivityEvent::TuningDegraded { details } => {
            let mut e = LogEntry::new(EventType::TuningDegraded, Severity::Warning);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}

// ──────────────────── tests ────────────────────
