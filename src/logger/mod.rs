//! Activity logging: JSONL writer and the logger thread that owns it.

pub mod activity;
pub mod jsonl;
