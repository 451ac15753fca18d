//! FFG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FfgError>;

/// Top-level error type for the freefall guard.
#[derive(Debug, Error)]
pub enum FfgError {
    #[error("[FFG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FFG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FFG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FFG-1101] invalid device {name:?}: {details}")]
    InvalidDevice { name: String, details: String },

    #[error("[FFG-2001] device {device} does not support head parking ({path}): {source}")]
    DeviceUnsupported {
        device: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FFG-2002] cannot open freefall event source {path}: {source}")]
    EventSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FFG-2003] freefall event source {path} failed: {source}")]
    EventSourceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FFG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FFG-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[FFG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl FfgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FFG-1001",
            Self::MissingConfig { .. } => "FFG-1002",
            Self::ConfigParse { .. } => "FFG-1003",
            Self::InvalidDevice { .. } => "FFG-1101",
            Self::DeviceUnsupported { .. } => "FFG-2001",
            Self::EventSourceUnavailable { .. } => "FFG-2002",
            Self::EventSourceFailed { .. } => "FFG-2003",
            Self::Io { .. } => "FFG-3002",
            Self::ChannelClosed { .. } => "FFG-3003",
            Self::Runtime { .. } => "FFG-3900",
        }
    }

    /// Whether the error ends the protection loop.
    ///
    /// Control-surface failures degrade protection but never stop it; only a
    /// broken event stream (or the plumbing that carries it) is terminal.
    #[must_use]
    pub const fn is_fatal_to_loop(&self) -> bool {
        matches!(
            self,
            Self::EventSourceFailed { .. } | Self::ChannelClosed { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for FfgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Runtime {
            details: format!("serde_json: {value}"),
        }
    }
}

impl From<toml::de::Error> for FfgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
