// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Inlet ingestion service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject
//! unrecognized config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Inlet configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InletConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Webhook HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outbound provider API settings.
    #[serde(default)]
    pub providers: ProviderConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8384
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("inlet").join("inlet.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("inlet.db"))
        .to_string_lossy()
        .into_owned()
}

/// Outbound provider API configuration.
///
/// Base URLs are overridable so tests can point adapters at a mock
/// server and deployments can pin a Graph API version.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL for Meta Graph API calls (WhatsApp Cloud API and
    /// Messenger Send API share it).
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,

    /// Base URL for TikTok Business API calls.
    #[serde(default = "default_tiktok_api_base")]
    pub tiktok_api_base: String,

    /// Hard timeout for outbound send calls, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Timeout for best-effort profile fetches, in seconds.
    #[serde(default = "default_profile_timeout_secs")]
    pub profile_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            graph_api_base: default_graph_api_base(),
            tiktok_api_base: default_tiktok_api_base(),
            send_timeout_secs: default_send_timeout_secs(),
            profile_timeout_secs: default_profile_timeout_secs(),
        }
    }
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_tiktok_api_base() -> String {
    "https://business-api.tiktok.com".to_string()
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_profile_timeout_secs() -> u64 {
    5
}
