//! # floorfuse common library
//!
//! Shared code for the floorfuse workspace:
//! - Error type used by configuration and I/O helpers
//! - TOML configuration file resolution, loading and atomic writing
//! - Logging configuration

pub mod config;
pub mod error;

pub use config::{ConfigResolver, LoggingConfig};
pub use error::{Error, Result};
