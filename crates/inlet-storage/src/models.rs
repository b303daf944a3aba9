// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Enum-valued columns are stored as their snake_case TEXT forms (the
//! `Display`/`FromStr` impls on the `inlet-core` enums); timestamps are
//! RFC3339 TEXT.

/// A tenant (one customer of the platform).
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub created_at: String,
}

/// A tenant's configured integration with one messaging provider.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: Option<String>,
    pub channel: String,
    pub endpoint_id: String,
    pub access_token: String,
    pub app_secret: String,
    pub webhook_verify_token: Option<String>,
    pub status: String,
    pub ai_enabled: bool,
    pub ai_personality: Option<String>,
    pub custom_instructions: Option<String>,
    pub first_message_delay_secs: i64,
    pub subsequent_message_delay_secs: i64,
}

/// An external human contact, one per real person per tenant, holding at
/// most one identity per channel.
#[derive(Debug, Clone)]
pub struct Lead {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub instagram_id: Option<String>,
    pub facebook_id: Option<String>,
    pub tiktok_id: Option<String>,
    pub email: Option<String>,
    pub source_channel: String,
    pub score: i64,
    pub first_contact_at: String,
    pub deleted_at: Option<String>,
    pub created_at: String,
}

/// A bounded thread of messages between a lead and the tenant on one
/// channel.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: Option<String>,
    pub lead_id: String,
    pub channel: String,
    pub channel_connection_id: String,
    pub status: String,
    pub ai_handling: bool,
    pub started_at: String,
    pub last_message_at: Option<String>,
    pub message_count: i64,
    pub created_at: String,
}

/// A stored message (inbound or outbound).
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub sender_kind: String,
    pub content: String,
    pub message_kind: String,
    pub channel: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub provider_error: Option<String>,
    pub reply_to_provider_id: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// A queued downstream job (`ai_response` or `send_message`).
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub tenant_id: String,
    pub job_type: String,
    pub payload: String,
    pub status: String,
    pub priority: i64,
    pub attempts: i64,
    pub max_attempts: i64,
    pub scheduled_for: String,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
