// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios through the full gateway + pipeline + storage
//! stack: a brand-new WhatsApp contact starts a conversation, follows
//! up, gets their thread reopened after resolution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use chrono::{DateTime, Utc};
use http::{Request, StatusCode};
use tower::ServiceExt;

use inlet_core::channel::ChannelAdapter;
use inlet_core::ChannelKind;
use inlet_gateway::{server::build_router, GatewayState};
use inlet_ingest::dispatch::AiResponsePayload;
use inlet_ingest::Pipeline;
use inlet_storage::queries::{conversations, jobs};
use inlet_test_utils::fixtures;
use inlet_test_utils::{ConnectionSeed, TestDb};
use inlet_whatsapp::{WhatsappChannel, WhatsappConfig};

const APP_SECRET: &str = "test-secret";

async fn whatsapp_gateway() -> (TestDb, Router) {
    let harness = TestDb::new().await;
    harness.seed_tenant("t1", "acme").await;
    harness
        .seed_connection(ConnectionSeed {
            id: "conn-wa".into(),
            channel: "whatsapp".into(),
            endpoint_id: "1555001".into(),
            app_secret: APP_SECRET.into(),
            first_message_delay_secs: 30,
            subsequent_message_delay_secs: 10,
            ..Default::default()
        })
        .await;

    let mut adapters: HashMap<ChannelKind, Arc<dyn ChannelAdapter>> = HashMap::new();
    adapters.insert(
        ChannelKind::Whatsapp,
        Arc::new(
            WhatsappChannel::new(WhatsappConfig {
                api_base: "http://127.0.0.1:9".into(),
                send_timeout: Duration::from_millis(100),
            })
            .unwrap(),
        ),
    );

    let state = GatewayState {
        db: harness.db.clone(),
        pipeline: Arc::new(Pipeline::new(harness.db.clone(), Duration::from_millis(100))),
        adapters: Arc::new(adapters),
    };
    let router = build_router(state);
    (harness, router)
}

async fn deliver(router: &Router, body: Vec<u8>) -> StatusCode {
    let signature = fixtures::meta_signature(APP_SECRET, &body);
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/acme/whatsapp")
                .header("X-Hub-Signature-256", signature)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

fn offset_secs(scheduled_for: &str, from: DateTime<Utc>) -> i64 {
    let at = DateTime::parse_from_rfc3339(scheduled_for)
        .unwrap()
        .with_timezone(&Utc);
    (at - from).num_seconds()
}

#[tokio::test]
async fn first_contact_then_follow_up() {
    let (harness, router) = whatsapp_gateway().await;

    // "Hola, quiero una cita" from a brand-new phone number.
    let before_first = Utc::now();
    let status = deliver(
        &router,
        fixtures::whatsapp_text(
            "1555001",
            "5215551234567",
            "wamid.first",
            "Hola, quiero una cita",
            "Ana García",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(harness.count("leads").await, 1);
    assert_eq!(harness.count("conversations").await, 1);
    assert_eq!(harness.count("messages").await, 1);

    let first_job = jobs::get(&harness.db, 1).await.unwrap().unwrap();
    assert_eq!(first_job.job_type, "ai_response");
    let payload: AiResponsePayload = serde_json::from_str(&first_job.payload).unwrap();
    assert!(payload.is_first_message);
    assert_eq!(payload.channel, ChannelKind::Whatsapp);
    let offset = offset_secs(&first_job.scheduled_for, before_first);
    assert!(
        (29..=32).contains(&offset),
        "first message uses first_message_delay, got {offset}s"
    );

    // The same number follows up moments later.
    let before_second = Utc::now();
    let status = deliver(
        &router,
        fixtures::whatsapp_text(
            "1555001",
            "5215551234567",
            "wamid.second",
            "¿Tienen algo mañana por la tarde?",
            "Ana García",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // No new lead or conversation.
    assert_eq!(harness.count("leads").await, 1);
    assert_eq!(harness.count("conversations").await, 1);
    assert_eq!(harness.count("messages").await, 2);

    let second_job = jobs::get(&harness.db, 2).await.unwrap().unwrap();
    let payload: AiResponsePayload = serde_json::from_str(&second_job.payload).unwrap();
    assert!(!payload.is_first_message);
    let offset = offset_secs(&second_job.scheduled_for, before_second);
    assert!(
        (9..=12).contains(&offset),
        "follow-up uses subsequent_message_delay, got {offset}s"
    );

    // Both jobs point at the same conversation.
    let first_payload: AiResponsePayload = serde_json::from_str(&first_job.payload).unwrap();
    assert_eq!(first_payload.conversation_id, payload.conversation_id);
}

#[tokio::test]
async fn resolved_thread_reopens_on_new_message() {
    let (harness, router) = whatsapp_gateway().await;

    deliver(
        &router,
        fixtures::whatsapp_text("1555001", "5215551234567", "wamid.1", "hola", "Ana"),
    )
    .await;

    let conversation_id: String = harness
        .db
        .connection()
        .call(|conn| {
            let id = conn.query_row("SELECT id FROM conversations LIMIT 1", [], |row| row.get(0))?;
            Ok::<String, tokio_rusqlite::Error>(id)
        })
        .await
        .unwrap();
    conversations::set_status(&harness.db, &conversation_id, "resolved")
        .await
        .unwrap();

    deliver(
        &router,
        fixtures::whatsapp_text("1555001", "5215551234567", "wamid.2", "una cosa más", "Ana"),
    )
    .await;

    assert_eq!(harness.count("conversations").await, 1, "no duplicate thread");
    let conv = conversations::get(&harness.db, &conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.status, "active");
    assert_eq!(conv.message_count, 2);
}

#[tokio::test]
async fn worker_sees_delayed_job_only_when_due() {
    let (harness, router) = whatsapp_gateway().await;

    deliver(
        &router,
        fixtures::whatsapp_text("1555001", "5215551234567", "wamid.1", "hola", "Ana"),
    )
    .await;

    // The job is scheduled 30s out; a worker polling now sees nothing.
    let due = jobs::dequeue_due(&harness.db, "ai_response").await.unwrap();
    assert!(due.is_none(), "delayed job must not be dequeued early");
}
