//! Settings and configuration module
//!
//! Provides unified configuration with:
//! - Builder pattern
//! - JSON loading
//! - Calibration constants for timed input

pub mod config;

pub use config::{ConfigError, EngineTiming, ExecutionConfig, ExecutionConfigBuilder};
