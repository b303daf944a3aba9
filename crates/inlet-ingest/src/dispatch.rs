// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream job dispatch with per-channel delay policy.
//!
//! Creates `ai_response` and `send_message` rows for the external
//! workers. No retry logic lives here -- attempts/max_attempts belong to
//! the job itself and the worker's own policy.

use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use inlet_core::{ChannelKind, InletError, JobType};
use inlet_storage::queries::jobs::{self, NewJob};
use inlet_storage::Database;

const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Payload of an `ai_response` job. This is the write contract other
/// subsystems rely on; they never see how identity resolution happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponsePayload {
    pub tenant_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub lead_id: String,
    pub channel: ChannelKind,
    pub channel_connection_id: String,
    pub is_first_message: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// Payload of a `send_message` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessagePayload {
    pub tenant_id: String,
    pub conversation_id: String,
    pub channel: ChannelKind,
    pub channel_connection_id: String,
    pub recipient_external_id: String,
    pub content: String,
}

/// Enqueues downstream work with computed scheduling.
#[derive(Clone)]
pub struct JobDispatcher {
    db: Database,
}

impl JobDispatcher {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Schedule an AI response `delay_secs` from now.
    pub async fn enqueue_ai_response(
        &self,
        payload: &AiResponsePayload,
        delay_secs: i64,
    ) -> Result<i64, InletError> {
        let job_id = jobs::enqueue(
            &self.db,
            NewJob {
                tenant_id: payload.tenant_id.clone(),
                job_type: JobType::AiResponse.to_string(),
                payload: serialize(payload)?,
                priority: 0,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                scheduled_for: scheduled_for(delay_secs),
            },
        )
        .await?;
        debug!(
            job_id,
            delay_secs,
            is_first_message = payload.is_first_message,
            "ai_response job enqueued"
        );
        Ok(job_id)
    }

    /// Enqueue an immediate outbound send.
    pub async fn enqueue_send(&self, payload: &SendMessagePayload) -> Result<i64, InletError> {
        let job_id = jobs::enqueue(
            &self.db,
            NewJob {
                tenant_id: payload.tenant_id.clone(),
                job_type: JobType::SendMessage.to_string(),
                payload: serialize(payload)?,
                priority: 0,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                scheduled_for: scheduled_for(0),
            },
        )
        .await?;
        debug!(job_id, "send_message job enqueued");
        Ok(job_id)
    }
}

fn serialize<T: Serialize>(payload: &T) -> Result<String, InletError> {
    serde_json::to_string(payload)
        .map_err(|e| InletError::Internal(format!("job payload serialization failed: {e}")))
}

/// `now + delay`, in the canonical RFC3339 TEXT format.
fn scheduled_for(delay_secs: i64) -> String {
    (Utc::now() + Duration::seconds(delay_secs.max(0)))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_for_honors_delay() {
        let now = Utc::now();
        let at = scheduled_for(30);
        let parsed = chrono::DateTime::parse_from_rfc3339(&at).unwrap();
        let offset = (parsed.with_timezone(&Utc) - now).num_seconds();
        assert!((29..=31).contains(&offset), "expected ~30s, got {offset}");
    }

    #[test]
    fn negative_delay_clamps_to_now() {
        let now = Utc::now();
        let at = scheduled_for(-5);
        let parsed = chrono::DateTime::parse_from_rfc3339(&at).unwrap();
        assert!((parsed.with_timezone(&Utc) - now).num_seconds().abs() <= 1);
    }

    #[test]
    fn ai_payload_round_trips() {
        let payload = AiResponsePayload {
            tenant_id: "t1".into(),
            conversation_id: "conv".into(),
            message_id: "msg".into(),
            lead_id: "lead".into(),
            channel: ChannelKind::Whatsapp,
            channel_connection_id: "c1".into(),
            is_first_message: true,
            ai_personality: Some("amable".into()),
            custom_instructions: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"is_first_message\":true"));
        assert!(!json.contains("custom_instructions"), "None fields stay out");
        let parsed: AiResponsePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.channel, ChannelKind::Whatsapp);
        assert_eq!(parsed.ai_personality.as_deref(), Some("amable"));
    }
}
