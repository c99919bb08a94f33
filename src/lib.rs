//! Inspection report publishing: render reports to HTML, publish them with a
//! JSON dump, and convert published HTML to PDF through external providers.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
