// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Inlet ingestion service.
//!
//! TOML configuration with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, and environment variable overrides via the
//! `INLET_` prefix.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::InletConfig;
pub use validation::ConfigError;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point used by the binary: loads TOML files and
/// env vars via Figment, then runs post-deserialization validation.
pub fn load_and_validate() -> Result<InletConfig, Vec<ConfigError>> {
    let config = loader::load_config()
        .map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<InletConfig, Vec<ConfigError>> {
    let config = loader::load_config_from_str(toml_content)
        .map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
    validation::validate_config(&config)?;
    Ok(config)
}
