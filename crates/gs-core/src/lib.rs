//! Core types, errors, and configuration for the globscan workspace.
//!
//! This crate provides the foundational pieces shared by the queue, scanner
//! and CLI crates:
//!
//! - [`ScanOptions`] / [`Config`] - every recognized scan option, loadable from JSON
//! - [`ConfigError`] - configuration loading and validation failures
//! - [`ExtensionSet`] - exact-match file extension exclusion set

#![deny(clippy::all)]
#![warn(missing_docs)]

mod config;
mod error;
mod extensions;

pub use config::{Config, ScanOptions};
pub use error::ConfigError;
pub use extensions::ExtensionSet;
