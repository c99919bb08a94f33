//! Domain layer types and invariants.

pub mod cdn;
pub mod naming;
pub mod report;
