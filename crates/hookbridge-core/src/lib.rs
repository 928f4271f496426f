//! Core types and configuration shared by the hookbridge crates.

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
