// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization configuration validation.
//!
//! Figment + serde handle types and unknown keys; this module checks
//! value-level constraints and accumulates every violation so operators
//! fix the config in one pass.

use thiserror::Error;

use crate::model::InletConfig;

/// A single configuration problem, pointing at the offending key.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment/serde failed to parse or extract the config at all.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A key holds a value outside its valid range.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate value-level constraints, accumulating all violations.
pub fn validate_config(config: &InletConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::InvalidValue {
            key: "service.log_level".into(),
            message: format!(
                "{:?} is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.server.host.is_empty() {
        errors.push(ConfigError::InvalidValue {
            key: "server.host".into(),
            message: "must not be empty".into(),
        });
    }

    if config.storage.database_path.is_empty() {
        errors.push(ConfigError::InvalidValue {
            key: "storage.database_path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.providers.send_timeout_secs == 0 {
        errors.push(ConfigError::InvalidValue {
            key: "providers.send_timeout_secs".into(),
            message: "must be at least 1 second".into(),
        });
    }

    for (key, url) in [
        ("providers.graph_api_base", &config.providers.graph_api_base),
        ("providers.tiktok_api_base", &config.providers.tiktok_api_base),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("{url:?} is not an http(s) URL"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
