//! Application services: preparation, rendering, publishing and conversion.

pub mod convert;
pub mod error;
pub mod pipeline;
pub mod prepare;
pub mod publish;
pub mod render;
pub mod store;
