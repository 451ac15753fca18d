//! Protection state machine and window policy.

pub mod machine;
pub mod policy;
