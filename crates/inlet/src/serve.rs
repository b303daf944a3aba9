// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `inlet serve` command implementation.
//!
//! Wires configuration, storage, the channel adapters, and the shared
//! ingestion pipeline into the gateway server, with ctrl-c shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inlet_config::InletConfig;
use inlet_core::channel::ChannelAdapter;
use inlet_core::{ChannelKind, InletError};
use inlet_gateway::server::{start_server, ServerConfig};
use inlet_gateway::GatewayState;
use inlet_ingest::Pipeline;
use inlet_meta::{MetaChannel, MetaConfig};
use inlet_storage::queries::jobs;
use inlet_storage::Database;
use inlet_tiktok::{TiktokChannel, TiktokConfig};
use inlet_whatsapp::{WhatsappChannel, WhatsappConfig};

/// Initialize the tracing subscriber from the configured log level.
///
/// `RUST_LOG` wins when set, so operators can raise verbosity per module
/// without touching the config file.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("inlet={log_level},tower_http=warn")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build one adapter per supported channel from the provider config.
fn build_adapters(
    config: &InletConfig,
) -> Result<HashMap<ChannelKind, Arc<dyn ChannelAdapter>>, InletError> {
    let send_timeout = Duration::from_secs(config.providers.send_timeout_secs);

    let mut adapters: HashMap<ChannelKind, Arc<dyn ChannelAdapter>> = HashMap::new();
    adapters.insert(
        ChannelKind::Whatsapp,
        Arc::new(WhatsappChannel::new(WhatsappConfig {
            api_base: config.providers.graph_api_base.clone(),
            send_timeout,
        })?),
    );
    adapters.insert(
        ChannelKind::Instagram,
        Arc::new(MetaChannel::new(
            ChannelKind::Instagram,
            MetaConfig {
                api_base: config.providers.graph_api_base.clone(),
                send_timeout,
            },
        )?),
    );
    adapters.insert(
        ChannelKind::Facebook,
        Arc::new(MetaChannel::new(
            ChannelKind::Facebook,
            MetaConfig {
                api_base: config.providers.graph_api_base.clone(),
                send_timeout,
            },
        )?),
    );
    adapters.insert(
        ChannelKind::Tiktok,
        Arc::new(TiktokChannel::new(TiktokConfig {
            api_base: config.providers.tiktok_api_base.clone(),
            send_timeout,
        })?),
    );
    Ok(adapters)
}

/// Run the `inlet serve` command until ctrl-c.
pub async fn run_serve(config: InletConfig) -> Result<(), InletError> {
    init_tracing(&config.service.log_level);

    info!("starting inlet serve");

    let db = Database::open(&config.storage.database_path).await?;

    // Crash recovery: return jobs orphaned by a dead worker to pending.
    match jobs::release_stale(&db).await {
        Ok(0) => {}
        Ok(released) => info!(released, "released stale processing jobs"),
        Err(e) => warn!(error = %e, "stale job sweep failed"),
    }

    let adapters = build_adapters(&config)?;
    let pipeline = Arc::new(Pipeline::new(
        db.clone(),
        Duration::from_secs(config.providers.profile_timeout_secs),
    ));

    let state = GatewayState {
        db: db.clone(),
        pipeline,
        adapters: Arc::new(adapters),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    tokio::select! {
        result = start_server(&server_config, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    db.close().await?;
    info!("inlet stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_cover_every_channel() {
        let adapters = build_adapters(&InletConfig::default()).unwrap();
        for channel in [
            ChannelKind::Whatsapp,
            ChannelKind::Instagram,
            ChannelKind::Facebook,
            ChannelKind::Tiktok,
        ] {
            let adapter = adapters.get(&channel).expect("adapter missing");
            assert_eq!(adapter.channel(), channel);
        }
    }
}
