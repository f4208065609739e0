//! Core functionality for the NodeInit activation agent.
//!
//! This crate provides the configuration model, the shared error type and
//! logging initialisation used across the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    ActivateConfig, ActiveConfig, Config, EngineConfig, Fingerprint, LoggerConfig, Proof,
};
pub use error::{Error, Result};
