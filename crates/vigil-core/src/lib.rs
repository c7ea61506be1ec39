//! Core types, config, and errors for the Vigil browser service.

pub mod config;
pub mod error;
pub mod types;
