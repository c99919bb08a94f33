//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod pdf;
pub mod storage;
pub mod telemetry;
