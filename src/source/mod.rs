//! Freefall event source.

pub mod freefall;
