// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook gateway.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use inlet_core::channel::WebhookHeaders;
use inlet_core::{ChannelContext, ChannelKind};
use inlet_ingest::resolver::pick_context;

use crate::GatewayState;

/// Acknowledgement body for a processed webhook.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Events the payload carried after normalization.
    pub received: usize,
    /// Events that were ingested or applied without error.
    pub processed: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "health check failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

/// GET /webhooks/{tenant}/{channel}
///
/// Meta/WhatsApp subscription handshake: echo `hub.challenge` when the
/// verify token matches an active connection for this route.
pub async fn verify_subscription(
    State(state): State<GatewayState>,
    Path((tenant, channel)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Ok(channel) = ChannelKind::from_str(&channel) else {
        return error_response(StatusCode::NOT_FOUND, "unknown channel");
    };

    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode != Some("subscribe") {
        return error_response(StatusCode::FORBIDDEN, "unsupported hub.mode");
    }

    let contexts = match state.pipeline.resolver().connections_for(&tenant, channel).await {
        Ok(contexts) => contexts,
        Err(e) => {
            warn!(error = %e, %tenant, "handshake lookup failed");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable");
        }
    };

    let matches = contexts
        .iter()
        .any(|c| c.webhook_verify_token.as_deref() == token && token.is_some());
    if matches {
        debug!(%tenant, %channel, "webhook subscription verified");
        (StatusCode::OK, challenge).into_response()
    } else {
        warn!(%tenant, %channel, "webhook verify token mismatch");
        error_response(StatusCode::FORBIDDEN, "verify token mismatch")
    }
}

/// POST /webhooks/{tenant}/{channel}
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path((tenant, channel)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(channel) = ChannelKind::from_str(&channel) else {
        return error_response(StatusCode::NOT_FOUND, "unknown channel");
    };
    let Some(adapter) = state.adapter(channel) else {
        return error_response(StatusCode::NOT_FOUND, "channel not enabled");
    };

    let contexts = match state.pipeline.resolver().connections_for(&tenant, channel).await {
        Ok(contexts) => contexts,
        Err(e) => {
            warn!(error = %e, %tenant, "connection lookup failed");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable");
        }
    };
    if contexts.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "no connected channel for tenant");
    }

    // Verification comes first, against every candidate connection's
    // secret; an unverified payload gets no further processing of any
    // kind.
    let webhook_headers = extract_webhook_headers(channel, &headers);
    let verified = contexts
        .iter()
        .any(|c| adapter.verify_signature(&body, &webhook_headers, &c.app_secret));
    if !verified {
        counter!("inlet_signature_rejections_total", "channel" => channel.to_string())
            .increment(1);
        warn!(%tenant, %channel, "webhook signature rejected");
        return error_response(StatusCode::UNAUTHORIZED, "signature verification failed");
    }

    let batch = match adapter.normalize(&body) {
        Ok(batch) => batch,
        Err(e) => {
            // Verified but unparseable: acknowledge so the provider does
            // not redeliver a body we will never understand.
            warn!(error = %e, %tenant, %channel, "unparseable webhook body");
            return (StatusCode::OK, Json(WebhookAck { received: 0, processed: 0 }))
                .into_response();
        }
    };

    let received = batch.len();
    let mut processed = 0;
    let mut transient_failure = false;

    for msg in &batch.messages {
        let Some(ctx) = route_event(&contexts, &msg.endpoint_id, &tenant, channel) else {
            continue;
        };
        match state.pipeline.process_message(adapter.as_ref(), ctx, msg).await {
            Ok(_) => processed += 1,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "transient storage failure, batch will be redelivered");
                transient_failure = true;
            }
            Err(e) => {
                warn!(error = %e, provider_message_id = %msg.provider_message_id,
                    "event failed, continuing batch");
            }
        }
    }

    for status in &batch.statuses {
        let Some(ctx) = route_event(&contexts, &status.endpoint_id, &tenant, channel) else {
            continue;
        };
        // Delivery receipts are not critical-path: failures are logged
        // and swallowed.
        match state.pipeline.apply_status(ctx, status).await {
            Ok(_) => processed += 1,
            Err(e) => {
                warn!(error = %e, provider_message_id = %status.provider_message_id,
                    "status update failed, ignoring");
            }
        }
    }

    if transient_failure {
        // The idempotency keys make provider redelivery safe.
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "transient storage failure");
    }
    (StatusCode::OK, Json(WebhookAck { received, processed })).into_response()
}

/// Find the connection an event belongs to, logging the skip otherwise.
fn route_event<'a>(
    contexts: &'a [ChannelContext],
    endpoint_id: &str,
    tenant: &str,
    channel: ChannelKind,
) -> Option<&'a ChannelContext> {
    let ctx = pick_context(contexts, endpoint_id);
    if ctx.is_none() {
        warn!(tenant, %channel, endpoint_id, "event targets an unconnected endpoint, skipping");
    }
    ctx
}

/// Pull the channel's signature material out of the HTTP headers.
fn extract_webhook_headers(channel: ChannelKind, headers: &HeaderMap) -> WebhookHeaders {
    match channel {
        ChannelKind::Whatsapp | ChannelKind::Instagram | ChannelKind::Facebook => WebhookHeaders {
            signature: header_string(headers, "x-hub-signature-256"),
            timestamp: None,
        },
        ChannelKind::Tiktok => parse_tiktok_signature(
            header_string(headers, "tiktok-signature").as_deref(),
        ),
    }
}

/// Parse TikTok's `t=<timestamp>,s=<signature>` header pair.
fn parse_tiktok_signature(raw: Option<&str>) -> WebhookHeaders {
    let mut parsed = WebhookHeaders::default();
    let Some(raw) = raw else {
        return parsed;
    };
    for part in raw.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => parsed.timestamp = Some(value.to_string()),
            Some(("s", value)) => parsed.signature = Some(value.to_string()),
            _ => {}
        }
    }
    parsed
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
