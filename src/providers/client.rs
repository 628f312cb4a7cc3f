use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::models::ExtractedTable;

/// What a provider hands back before the gateway stamps on identity,
/// category, cost and latency.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Unmodified answer body, kept for audit.
    pub raw: String,
    /// Narrative answer text with tables removed.
    pub content: String,
    pub tables: Vec<ExtractedTable>,
    pub quality: f32,
    pub confidence: f32,
    pub relevance: f32,
}

/// One external answer source. Implementations stay thin: rate limiting,
/// deadlines and retry live in the gateway, not here.
#[async_trait]
pub trait IntelligenceProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn call(&self, prompt: &str, temperature: f32) -> Result<ProviderReply, ProviderError>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    prompt: &'a str,
    temperature: f32,
}

#[derive(Deserialize)]
struct WireAnswer {
    content: String,
    #[serde(default)]
    tables: Vec<ExtractedTable>,
    #[serde(default = "default_signal")]
    quality: f32,
    #[serde(default = "default_signal")]
    confidence: f32,
    #[serde(default = "default_signal")]
    relevance: f32,
}

fn default_signal() -> f32 {
    0.5
}

/// JSON-over-HTTP provider client.
pub struct HttpProvider {
    id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(id: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout { provider: self.id.clone() }
        } else {
            ProviderError::Connect {
                provider: self.id.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl IntelligenceProvider for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, prompt: &str, temperature: f32) -> Result<ProviderReply, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WireRequest { prompt, temperature })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth { provider: self.id.clone() });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { provider: self.id.clone() });
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: self.id.clone(),
                status: status.as_u16(),
            });
        }

        let raw = response.text().await.map_err(|e| self.transport_error(e))?;
        let answer: WireAnswer = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Malformed(format!("{}: {e}", self.id)))?;

        Ok(ProviderReply {
            raw,
            content: answer.content,
            tables: answer.tables,
            quality: answer.quality.clamp(0.0, 1.0),
            confidence: answer.confidence.clamp(0.0, 1.0),
            relevance: answer.relevance.clamp(0.0, 1.0),
        })
    }
}

/// Scripted in-process provider for tests. Queued replies are consumed in
/// order; once the queue is empty every call gets a canned single-table
/// answer derived from the prompt.
pub struct MockProvider {
    id: String,
    scripted: std::sync::Mutex<std::collections::VecDeque<Result<ProviderReply, ProviderError>>>,
    calls: std::sync::atomic::AtomicU64,
}

impl MockProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            scripted: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn push_reply(&self, reply: ProviderReply) {
        if let Ok(mut q) = self.scripted.lock() {
            q.push_back(Ok(reply));
        }
    }

    pub fn push_failure(&self, err: ProviderError) {
        if let Ok(mut q) = self.scripted.lock() {
            q.push_back(Err(err));
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn canned_reply(content: &str) -> ProviderReply {
        ProviderReply {
            raw: content.to_string(),
            content: content.to_string(),
            tables: vec![ExtractedTable {
                title: None,
                headers: vec!["Parameter".into(), "Value".into(), "Source".into()],
                rows: vec![vec!["Dose".into(), "5 mg".into(), "FDA label".into()]],
            }],
            quality: 0.9,
            confidence: 0.85,
            relevance: 0.8,
        }
    }
}

#[async_trait]
impl IntelligenceProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, prompt: &str, _temperature: f32) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let scripted = self.scripted.lock().ok().and_then(|mut q| q.pop_front());
        match scripted {
            Some(result) => result,
            None => Ok(Self::canned_reply(&format!("answer for: {prompt}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_scripted_then_canned() {
        let mock = MockProvider::new("m");
        mock.push_failure(ProviderError::Timeout { provider: "m".into() });
        mock.push_reply(MockProvider::canned_reply("scripted"));

        assert!(mock.call("p", 0.0).await.is_err());
        let reply = mock.call("p", 0.0).await.unwrap();
        assert_eq!(reply.content, "scripted");

        let fallback = mock.call("what is apixaban", 0.0).await.unwrap();
        assert!(fallback.content.contains("apixaban"));
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn wire_answer_defaults_missing_signals() {
        let answer: WireAnswer =
            serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(answer.quality, 0.5);
        assert!(answer.tables.is_empty());
    }
}
