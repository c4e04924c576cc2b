//! Parsing and validation of `deptrack.toml` tracker configuration.
//!
//! Every section is optional; a missing file yields [`TrackerConfig::default`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{discover_config, load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
