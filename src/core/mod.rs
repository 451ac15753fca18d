//! Core types: errors, configuration, device paths.

pub mod config;
pub mod errors;
pub mod paths;
