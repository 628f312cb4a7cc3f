//! Terminal-state notifications.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::RequestStatus;

/// Payload delivered when a request reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub request_id: Uuid,
    pub drug_name: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

/// Delivery is best-effort: a failed notification never fails the run.
#[async_trait]
pub trait PipelineNotifier: Send + Sync {
    async fn notify(&self, event: &PipelineEvent);
}

pub struct NoopNotifier;

#[async_trait]
impl PipelineNotifier for NoopNotifier {
    async fn notify(&self, _event: &PipelineEvent) {}
}

/// POSTs the event as JSON to a configured webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PipelineNotifier for WebhookNotifier {
    async fn notify(&self, event: &PipelineEvent) {
        let result = self.client.post(&self.url).json(event).send().await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!(request_id = %event.request_id, status = %resp.status(), "webhook rejected notification");
            }
            Err(err) => {
                warn!(request_id = %event.request_id, error = %err, "webhook notification failed");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_without_empty_reason() {
        let event = PipelineEvent {
            request_id: Uuid::new_v4(),
            drug_name: "apixaban".into(),
            status: RequestStatus::Completed,
            error_reason: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"completed\""));
        assert!(!json.contains("error_reason"));
    }
}
