// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests over a real (tempdir) database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use inlet_core::{ChannelContext, ChannelKind, InboundMessage, MessageKind, SenderProfile};
use inlet_ingest::dispatch::AiResponsePayload;
use inlet_ingest::Pipeline;
use inlet_storage::queries::{conversations, jobs, leads, messages};
use inlet_test_utils::{ConnectionSeed, MockAdapter, TestDb};

const PROFILE_TIMEOUT: Duration = Duration::from_millis(200);

async fn seeded_db() -> TestDb {
    let harness = TestDb::new().await;
    harness.seed_tenant("t1", "acme").await;
    harness
        .seed_connection(ConnectionSeed {
            id: "conn-1".into(),
            tenant_id: "t1".into(),
            channel: "whatsapp".into(),
            endpoint_id: "1555001".into(),
            first_message_delay_secs: 30,
            subsequent_message_delay_secs: 10,
            ..Default::default()
        })
        .await;
    harness
}

fn whatsapp_ctx() -> ChannelContext {
    ChannelContext {
        tenant_id: "t1".into(),
        tenant_slug: "acme".into(),
        branch_id: None,
        channel: ChannelKind::Whatsapp,
        connection_id: "conn-1".into(),
        endpoint_id: "1555001".into(),
        access_token: "test-token".into(),
        app_secret: "test-secret".into(),
        webhook_verify_token: None,
        ai_enabled: true,
        ai_personality: None,
        custom_instructions: None,
        first_message_delay_secs: 30,
        subsequent_message_delay_secs: 10,
    }
}

fn whatsapp_msg(pmid: &str, from: &str, text: &str) -> InboundMessage {
    InboundMessage {
        channel: ChannelKind::Whatsapp,
        endpoint_id: "1555001".into(),
        sender_external_id: from.into(),
        provider_message_id: pmid.into(),
        timestamp: Utc::now(),
        kind: MessageKind::Text,
        text: Some(text.into()),
        media_url: None,
        media_type: None,
        reply_to_provider_id: None,
        sender_name: Some("Ana García".into()),
        sender_phone: Some(from.into()),
        sender_email: None,
        metadata: None,
    }
}

fn scheduled_offset_secs(scheduled_for: &str, from: DateTime<Utc>) -> i64 {
    let at = DateTime::parse_from_rfc3339(scheduled_for)
        .unwrap()
        .with_timezone(&Utc);
    (at - from).num_seconds()
}

#[tokio::test]
async fn first_contact_creates_everything_and_schedules_with_first_delay() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Whatsapp);

    let before = Utc::now();
    let outcome = pipeline
        .process_message(
            &adapter,
            &whatsapp_ctx(),
            &whatsapp_msg("wamid.1", "5215551234567", "Hola, quiero una cita"),
        )
        .await
        .unwrap();

    assert!(outcome.lead_is_new);
    assert!(outcome.conversation_is_new);
    assert!(!outcome.conversation_reopened);
    assert!(!outcome.is_duplicate);

    let lead = leads::get(&harness.db, &outcome.lead_id).await.unwrap().unwrap();
    assert_eq!(lead.phone.as_deref(), Some("5215551234567"));
    assert_eq!(lead.name.as_deref(), Some("Ana García"));

    let msg = messages::get(&harness.db, &outcome.message_id).await.unwrap().unwrap();
    assert_eq!(msg.content, "Hola, quiero una cita");

    // Exactly one ai_response job, scheduled now + first_message_delay,
    // flagged as the conversation opener.
    let job = jobs::get(&harness.db, outcome.job_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(job.job_type, "ai_response");
    let offset = scheduled_offset_secs(&job.scheduled_for, before);
    assert!((29..=32).contains(&offset), "expected ~30s delay, got {offset}");

    let payload: AiResponsePayload = serde_json::from_str(&job.payload).unwrap();
    assert!(payload.is_first_message);
    assert_eq!(payload.conversation_id, outcome.conversation_id);
    assert_eq!(payload.lead_id, outcome.lead_id);
}

#[tokio::test]
async fn second_message_reuses_lead_and_uses_subsequent_delay() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Whatsapp);
    let ctx = whatsapp_ctx();

    let first = pipeline
        .process_message(&adapter, &ctx, &whatsapp_msg("wamid.1", "5215551234567", "Hola"))
        .await
        .unwrap();

    let before = Utc::now();
    let second = pipeline
        .process_message(
            &adapter,
            &ctx,
            &whatsapp_msg("wamid.2", "5215551234567", "¿Tienen cita mañana?"),
        )
        .await
        .unwrap();

    assert!(!second.lead_is_new);
    assert!(!second.conversation_is_new);
    assert_eq!(second.lead_id, first.lead_id);
    assert_eq!(second.conversation_id, first.conversation_id);
    assert_eq!(harness.count("leads").await, 1);
    assert_eq!(harness.count("conversations").await, 1);

    let job = jobs::get(&harness.db, second.job_id.unwrap()).await.unwrap().unwrap();
    let offset = scheduled_offset_secs(&job.scheduled_for, before);
    assert!((9..=12).contains(&offset), "expected ~10s delay, got {offset}");
    let payload: AiResponsePayload = serde_json::from_str(&job.payload).unwrap();
    assert!(!payload.is_first_message);
}

#[tokio::test]
async fn redelivered_webhook_is_fully_idempotent() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Whatsapp);
    let ctx = whatsapp_ctx();
    let msg = whatsapp_msg("wamid.1", "5215551234567", "Hola");

    let first = pipeline.process_message(&adapter, &ctx, &msg).await.unwrap();
    assert!(!first.is_duplicate);

    let second = pipeline.process_message(&adapter, &ctx, &msg).await.unwrap();
    assert!(second.is_duplicate);
    assert_eq!(second.message_id, first.message_id);
    assert!(second.job_id.is_none(), "duplicates must not re-dispatch");

    let conv = conversations::get(&harness.db, &first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.message_count, 1);
    assert_eq!(harness.count("messages").await, 1);
    assert_eq!(harness.count("jobs").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_contact_creates_exactly_one_lead_and_conversation() {
    let harness = seeded_db().await;
    let pipeline = Arc::new(Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT));
    let adapter = Arc::new(MockAdapter::new(ChannelKind::Whatsapp));

    // 50 concurrent distinct messages from the same brand-new sender.
    let mut handles = Vec::new();
    for i in 0..50 {
        let pipeline = Arc::clone(&pipeline);
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            pipeline
                .process_message(
                    adapter.as_ref(),
                    &whatsapp_ctx(),
                    &whatsapp_msg(&format!("wamid.{i}"), "5215551234567", "hola"),
                )
                .await
        }));
    }

    let mut new_leads = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.lead_is_new {
            new_leads += 1;
        }
    }

    assert_eq!(harness.count("leads").await, 1, "exactly one lead may exist");
    assert_eq!(
        harness.count("conversations").await,
        1,
        "exactly one open conversation may exist"
    );
    assert_eq!(new_leads, 1, "exactly one call may report creation");
    assert_eq!(harness.count("messages").await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_retries_of_one_message_store_it_once() {
    let harness = seeded_db().await;
    let pipeline = Arc::new(Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT));
    let adapter = Arc::new(MockAdapter::new(ChannelKind::Whatsapp));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pipeline = Arc::clone(&pipeline);
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            pipeline
                .process_message(
                    adapter.as_ref(),
                    &whatsapp_ctx(),
                    &whatsapp_msg("wamid.same", "5215551234567", "hola"),
                )
                .await
        }));
    }
    let mut stored = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if !outcome.is_duplicate {
            stored += 1;
        }
    }

    assert_eq!(stored, 1, "one delivery wins, the rest are duplicates");
    assert_eq!(harness.count("messages").await, 1);
    assert_eq!(harness.count("jobs").await, 1);
}

#[tokio::test]
async fn send_jobs_enqueue_immediately() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);

    let job_id = pipeline
        .dispatcher()
        .enqueue_send(&inlet_ingest::SendMessagePayload {
            tenant_id: "t1".into(),
            conversation_id: "conv-1".into(),
            channel: ChannelKind::Whatsapp,
            channel_connection_id: "conn-1".into(),
            recipient_external_id: "5215551234567".into(),
            content: "¡Claro! ¿Qué día te viene bien?".into(),
        })
        .await
        .unwrap();

    // Immediately due for the send worker.
    let job = jobs::dequeue_due(&harness.db, "send_message").await.unwrap().unwrap();
    assert_eq!(job.id, job_id);
    assert_eq!(job.tenant_id, "t1");
    assert!(job.payload.contains("5215551234567"));
}

#[tokio::test]
async fn resolved_conversation_reopens_and_keeps_counting() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Whatsapp);
    let ctx = whatsapp_ctx();

    let first = pipeline
        .process_message(&adapter, &ctx, &whatsapp_msg("wamid.1", "5215551234567", "Hola"))
        .await
        .unwrap();

    conversations::set_status(&harness.db, &first.conversation_id, "resolved")
        .await
        .unwrap();

    let after = pipeline
        .process_message(&adapter, &ctx, &whatsapp_msg("wamid.2", "5215551234567", "¿Sigue ahí?"))
        .await
        .unwrap();

    assert!(after.conversation_reopened);
    assert!(!after.conversation_is_new);
    assert_eq!(after.conversation_id, first.conversation_id);

    let conv = conversations::get(&harness.db, &first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.status, "active");
    assert_eq!(conv.message_count, 2, "count continues on the same row");
    assert_eq!(harness.count("conversations").await, 1);
}

#[tokio::test]
async fn ai_disabled_connection_creates_no_job() {
    let harness = seeded_db().await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Whatsapp);
    let mut ctx = whatsapp_ctx();
    ctx.ai_enabled = false;

    let outcome = pipeline
        .process_message(&adapter, &ctx, &whatsapp_msg("wamid.1", "5215551234567", "Hola"))
        .await
        .unwrap();

    assert!(outcome.job_id.is_none());
    assert_eq!(harness.count("jobs").await, 0);
    // Everything else still happened.
    assert_eq!(harness.count("messages").await, 1);
}

#[tokio::test]
async fn instagram_message_cross_links_to_known_phone() {
    let harness = seeded_db().await;
    harness
        .seed_connection(ConnectionSeed {
            id: "conn-ig".into(),
            channel: "instagram".into(),
            endpoint_id: "page-1".into(),
            ..Default::default()
        })
        .await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);

    // First contact on WhatsApp creates the lead with its phone.
    let wa_adapter = MockAdapter::new(ChannelKind::Whatsapp);
    let wa = pipeline
        .process_message(
            &wa_adapter,
            &whatsapp_ctx(),
            &whatsapp_msg("wamid.1", "5215551234567", "Hola"),
        )
        .await
        .unwrap();

    // The same person writes on Instagram; the provider supplied their
    // phone, so the identities merge instead of spawning a second lead.
    let ig_adapter = MockAdapter::new(ChannelKind::Instagram);
    let mut ig_ctx = whatsapp_ctx();
    ig_ctx.channel = ChannelKind::Instagram;
    ig_ctx.connection_id = "conn-ig".into();
    ig_ctx.endpoint_id = "page-1".into();

    let ig_msg = InboundMessage {
        channel: ChannelKind::Instagram,
        endpoint_id: "page-1".into(),
        sender_external_id: "psid-777".into(),
        provider_message_id: "m_1".into(),
        timestamp: Utc::now(),
        kind: MessageKind::Text,
        text: Some("hola desde instagram".into()),
        media_url: None,
        media_type: None,
        reply_to_provider_id: None,
        sender_name: None,
        sender_phone: Some("5215551234567".into()),
        sender_email: None,
        metadata: None,
    };
    let ig = pipeline.process_message(&ig_adapter, &ig_ctx, &ig_msg).await.unwrap();

    assert!(ig.lead_cross_linked);
    assert!(!ig.lead_is_new);
    assert_eq!(ig.lead_id, wa.lead_id);
    assert_eq!(harness.count("leads").await, 1);

    let lead = leads::get(&harness.db, &wa.lead_id).await.unwrap().unwrap();
    assert_eq!(lead.instagram_id.as_deref(), Some("psid-777"));
    assert_eq!(lead.phone.as_deref(), Some("5215551234567"));

    // Separate conversation per channel.
    assert_ne!(ig.conversation_id, wa.conversation_id);
    assert_eq!(harness.count("conversations").await, 2);
}

#[tokio::test]
async fn profile_failure_still_creates_lead_with_placeholder() {
    let harness = seeded_db().await;
    harness
        .seed_connection(ConnectionSeed {
            id: "conn-ig".into(),
            channel: "instagram".into(),
            endpoint_id: "page-1".into(),
            ..Default::default()
        })
        .await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Instagram).with_failing_profile("api down");

    let mut ctx = whatsapp_ctx();
    ctx.channel = ChannelKind::Instagram;
    ctx.connection_id = "conn-ig".into();
    ctx.endpoint_id = "page-1".into();

    let msg = InboundMessage {
        channel: ChannelKind::Instagram,
        endpoint_id: "page-1".into(),
        sender_external_id: "psid-1".into(),
        provider_message_id: "m_1".into(),
        timestamp: Utc::now(),
        kind: MessageKind::Text,
        text: Some("hola".into()),
        media_url: None,
        media_type: None,
        reply_to_provider_id: None,
        sender_name: None,
        sender_phone: None,
        sender_email: None,
        metadata: None,
    };
    let outcome = pipeline.process_message(&adapter, &ctx, &msg).await.unwrap();
    assert!(outcome.lead_is_new, "profile failure must not block creation");

    let lead = leads::get(&harness.db, &outcome.lead_id).await.unwrap().unwrap();
    assert_eq!(lead.name.as_deref(), Some("Instagram contact"));
}

#[tokio::test]
async fn profile_result_names_the_lead() {
    let harness = seeded_db().await;
    harness
        .seed_connection(ConnectionSeed {
            id: "conn-ig".into(),
            channel: "instagram".into(),
            endpoint_id: "page-1".into(),
            ..Default::default()
        })
        .await;
    let pipeline = Pipeline::new(harness.db.clone(), PROFILE_TIMEOUT);
    let adapter = MockAdapter::new(ChannelKind::Instagram).with_profile(SenderProfile {
        display_name: Some("ana.g".into()),
        ..Default::default()
    });

    let mut ctx = whatsapp_ctx();
    ctx.channel = ChannelKind::Instagram;
    ctx.connection_id = "conn-ig".into();
    ctx.endpoint_id = "page-1".into();

    let msg = InboundMessage {
        channel: ChannelKind::Instagram,
        endpoint_id: "page-1".into(),
        sender_external_id: "psid-2".into(),
        provider_message_id: "m_2".into(),
        timestamp: Utc::now(),
        kind: MessageKind::Text,
        text: Some("hola".into()),
        media_url: None,
        media_type: None,
        reply_to_provider_id: None,
        sender_name: None,
        sender_phone: None,
        sender_email: None,
        metadata: None,
    };
    let outcome = pipeline.process_message(&adapter, &ctx, &msg).await.unwrap();
    let lead = leads::get(&harness.db, &outcome.lead_id).await.unwrap().unwrap();
    assert_eq!(lead.name.as_deref(), Some("ana.g"));
}
