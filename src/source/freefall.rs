//! Freefall event stream: blocking reader thread + race-select against the
//! protection deadline and shutdown requests.
//!
//! The kernel exposes one byte per freefall notification. A dedicated thread
//! performs the blocking reads and forwards them over a bounded crossbeam
//! channel; [`EventSource::read_next`] then waits on whichever of
//! (event, deadline, shutdown) happens first. A deadline firing is reported as
//! [`SourceRead::Interrupted`], never as an error.

#![allow(missing_docs)]

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvError, Sender, at, bounded, never, select};

use crate::core::errors::{FfgError, Result};

/// Events buffered between the reader thread and the protection loop.
const EVENT_CHANNEL_CAP: usize = 64;

/// One freefall notification. The byte is the kernel's event count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionEvent {
    pub count: u8,
}

/// Why the process was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// An intercepted termination signal (signal number).
    Signal(i32),
    /// Programmatic request, or the shutdown channel went away.
    Requested,
}

/// A wake-up that carries no event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    DeadlineElapsed,
    Shutdown(ShutdownCause),
}

/// Result of one wait on the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRead {
    Event(ProtectionEvent),
    Interrupted(Interrupt),
}

#[derive(Debug)]
enum ReaderMessage {
    Event(u8),
    Failed(io::Error),
}

/// An opened but not yet running event stream.
///
/// Opening and starting are separate so the file descriptor can be acquired
/// before the process detaches while the reader thread is spawned after.
pub struct FreefallStream {
    path: PathBuf,
    reader: Box<dyn Read + Send>,
}

impl FreefallStream {
    /// Open the freefall device for blocking reads.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| FfgError::EventSourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(path, file))
    }

    /// Wrap any blocking byte stream; `label` names it in errors.
    pub fn from_reader(label: impl Into<PathBuf>, reader: impl Read + Send + 'static) -> Self {
        Self {
            path: label.into(),
            reader: Box::new(reader),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawn the reader thread and attach the shutdown channel.
    ///
    /// The reader thread is not joined: it stays blocked in `read` until the
    /// process exits.
    pub fn start(self, shutdown: Receiver<ShutdownCause>) -> Result<EventSource> {
        let (tx, rx) = bounded::<ReaderMessage>(EVENT_CHANNEL_CAP);
        let reader = self.reader;

        thread::Builder::new()
            .name("ffg-freefall".to_string())
            .spawn(move || reader_thread_main(reader, &tx))
            .map_err(|e| FfgError::Runtime {
                details: format!("failed to spawn freefall reader thread: {e}"),
            })?;

        Ok(EventSource {
            path: self.path,
            events: rx,
            shutdown,
        })
    }
}

/// Running event source: the single blocking wait of the protection loop.
pub struct EventSource {
    path: PathBuf,
    events: Receiver<ReaderMessage>,
    shutdown: Receiver<ShutdownCause>,
}

impl EventSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until an event arrives, `deadline` passes, or shutdown is requested.
    ///
    /// `None` waits without a deadline. When the deadline and an event are both
    /// ready, the event is returned.
    pub fn read_next(&self, deadline: Option<Instant>) -> Result<SourceRead> {
        let timer = deadline.map_or_else(never, at);

        select! {
            recv(self.events) -> msg => self.deliver(msg),
            recv(self.shutdown) -> cause => Ok(SourceRead::Interrupted(Interrupt::Shutdown(
                cause.unwrap_or(ShutdownCause::Requested),
            ))),
            recv(timer) -> _ => match self.events.try_recv() {
                Ok(msg) => self.deliver(Ok(msg)),
                Err(_) => Ok(SourceRead::Interrupted(Interrupt::DeadlineElapsed)),
            },
        }
    }

    fn deliver(&self, msg: std::result::Result<ReaderMessage, RecvError>) -> Result<SourceRead> {
        match msg {
            Ok(ReaderMessage::Event(count)) => Ok(SourceRead::Event(ProtectionEvent { count })),
            Ok(ReaderMessage::Failed(source)) => Err(FfgError::EventSourceFailed {
                path: self.path.clone(),
                source,
            }),
            Err(RecvError) => Err(FfgError::ChannelClosed {
                component: "freefall-reader",
            }),
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn reader_thread_main(mut reader: Box<dyn Read + Send>, tx: &Sender<ReaderMessage>) {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(ReaderMessage::Failed(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "event stream closed",
                )));
                return;
            }
            Ok(_) => {
                if tx.send(ReaderMessage::Event(buf[0])).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(ReaderMessage::Failed(e));
                return;
            }
        }
    }
}
