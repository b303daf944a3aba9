// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./inlet.toml` > `~/.config/inlet/inlet.toml`
//! > `/etc/inlet/inlet.toml` with environment variable overrides via the
//! `INLET_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::InletConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/inlet/inlet.toml` (system-wide)
/// 3. `~/.config/inlet/inlet.toml` (user XDG config)
/// 4. `./inlet.toml` (local directory)
/// 5. `INLET_*` environment variables
pub fn load_config() -> Result<InletConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(InletConfig::default()))
        .merge(Toml::file("/etc/inlet/inlet.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("inlet/inlet.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("inlet.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file or env lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<InletConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(InletConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<InletConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(InletConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `INLET_STORAGE_DATABASE_PATH` must
/// map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("INLET_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("providers_", "providers.", 1);
        mapped.into()
    })
}
