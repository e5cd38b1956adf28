//! Shared utilities: configuration loading.

pub mod config;

pub use config::Config;
