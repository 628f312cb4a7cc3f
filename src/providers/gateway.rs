use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::client::IntelligenceProvider;
use super::{HttpProvider, ProviderError};
use crate::config::{ConfigSnapshot, PipelineTuning, ProviderConfig};
use crate::models::{ProviderResponse, StandardizedResponse};

/// Running totals for one provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderUsage {
    pub calls: u64,
    pub failures: u64,
    pub total_cost: f64,
    pub total_latency_ms: u64,
}

/// Single choke point for outbound provider traffic.
///
/// Owns per-provider rate limiting, per-call deadlines, retry of transient
/// failures with jittered exponential backoff, and usage accounting. The
/// rest of the pipeline never holds a provider client directly.
pub struct ProviderGateway {
    clients: HashMap<String, Arc<dyn IntelligenceProvider>>,
    configs: HashMap<String, ProviderConfig>,
    tuning: PipelineTuning,
    last_call: Mutex<HashMap<String, Instant>>,
    usage: Mutex<HashMap<String, ProviderUsage>>,
}

impl ProviderGateway {
    /// Build HTTP clients for every enabled provider that has an endpoint.
    pub fn new(config: &ConfigSnapshot) -> Self {
        let mut clients: HashMap<String, Arc<dyn IntelligenceProvider>> = HashMap::new();
        let mut configs = HashMap::new();
        for provider in &config.providers {
            if let Some(url) = &provider.base_url {
                clients.insert(
                    provider.id.clone(),
                    Arc::new(HttpProvider::new(&provider.id, url)),
                );
            }
            configs.insert(provider.id.clone(), provider.clone());
        }
        Self {
            clients,
            configs,
            tuning: config.tuning.clone(),
            last_call: Mutex::new(HashMap::new()),
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Replace or add a client implementation for a configured provider.
    pub fn register(&mut self, client: Arc<dyn IntelligenceProvider>) {
        self.clients.insert(client.id().to_string(), client);
    }

    /// One provider call for one (request, category) prompt.
    ///
    /// `temperature` overrides the provider's configured default for this
    /// call only. Transient failures are retried up to the tuning cap;
    /// permanent ones surface immediately.
    pub async fn collect(
        &self,
        request_id: Uuid,
        category_id: &str,
        provider_id: &str,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<ProviderResponse, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::EmptyPrompt);
        }
        let config = self
            .configs
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))?;
        if !config.enabled {
            return Err(ProviderError::Disabled(provider_id.to_string()));
        }
        let client = self
            .clients
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))?;
        let temperature = temperature.unwrap_or(config.temperature);

        let mut attempt: u32 = 0;
        loop {
            self.enforce_rate_limit(provider_id, config.min_interval_ms).await;

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                client.call(prompt, temperature),
            )
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout { provider: provider_id.to_string() }));

            match outcome {
                Ok(reply) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.record(provider_id, false, config.cost_per_call, latency_ms).await;
                    debug!(provider = provider_id, category = category_id, latency_ms, "provider call ok");

                    let standardized = StandardizedResponse {
                        provider_id: provider_id.to_string(),
                        kind: config.kind,
                        category_id: category_id.to_string(),
                        content: reply.content,
                        tables: reply.tables,
                        quality: reply.quality,
                        confidence: reply.confidence,
                        relevance: reply.relevance,
                    };
                    return Ok(ProviderResponse::new(
                        request_id,
                        reply.raw,
                        standardized,
                        temperature,
                        config.cost_per_call,
                        latency_ms,
                    ));
                }
                Err(err) if err.is_transient() && attempt < self.tuning.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        provider = provider_id,
                        category = category_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.record(provider_id, true, 0.0, latency_ms).await;
                    warn!(provider = provider_id, category = category_id, error = %err, "provider call failed");
                    return Err(err);
                }
            }
        }
    }

    pub async fn usage(&self) -> HashMap<String, ProviderUsage> {
        self.usage.lock().await.clone()
    }

    /// Jittered exponential backoff, capped by the tuning ceiling.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .tuning
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.tuning.backoff_max_ms);
        let jitter = rand::thread_rng().gen_range(0..=exp / 2);
        Duration::from_millis(exp + jitter)
    }

    /// Wait until the provider's minimum inter-call interval has elapsed.
    /// The slot is claimed before sleeping so concurrent callers queue up.
    async fn enforce_rate_limit(&self, provider_id: &str, min_interval_ms: u64) {
        if min_interval_ms == 0 {
            return;
        }
        let interval = Duration::from_millis(min_interval_ms);
        let wait = {
            let mut last = self.last_call.lock().await;
            let now = Instant::now();
            let wait = match last.get(provider_id) {
                Some(prev) => interval.saturating_sub(now.duration_since(*prev)),
                None => Duration::ZERO,
            };
            last.insert(provider_id.to_string(), now + wait);
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn record(&self, provider_id: &str, failed: bool, cost: f64, latency_ms: u64) {
        let mut usage = self.usage.lock().await;
        let entry = usage.entry(provider_id.to_string()).or_default();
        entry.calls += 1;
        if failed {
            entry.failures += 1;
        }
        entry.total_cost += cost;
        entry.total_latency_ms += latency_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderKind;
    use crate::providers::MockProvider;

    fn test_snapshot() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default_snapshot();
        snapshot.providers = vec![ProviderConfig {
            id: "mock".into(),
            kind: ProviderKind::Llm,
            enabled: true,
            base_url: None,
            min_interval_ms: 0,
            timeout_secs: 5,
            temperature: 0.2,
            cost_per_call: 0.01,
        }];
        snapshot.tuning.backoff_base_ms = 1;
        snapshot.tuning.backoff_max_ms = 4;
        snapshot
    }

    fn gateway_with(mock: Arc<MockProvider>) -> ProviderGateway {
        let mut gateway = ProviderGateway::new(&test_snapshot());
        gateway.register(mock);
        gateway
    }

    #[tokio::test]
    async fn collect_builds_standardized_response() {
        let mock = Arc::new(MockProvider::new("mock"));
        let gateway = gateway_with(mock.clone());

        let request_id = Uuid::new_v4();
        let resp = gateway
            .collect(request_id, "physicochemical", "mock", "prompt", None)
            .await
            .unwrap();
        assert_eq!(resp.request_id, request_id);
        assert_eq!(resp.provider_id, "mock");
        assert_eq!(resp.category_id, "physicochemical");
        assert_eq!(resp.standardized.kind, ProviderKind::Llm);
        assert_eq!(resp.cost_estimate, 0.01);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn per_call_temperature_overrides_the_configured_default() {
        let mock = Arc::new(MockProvider::new("mock"));
        let gateway = gateway_with(mock);

        let resp = gateway
            .collect(Uuid::new_v4(), "c", "mock", "p", Some(0.9))
            .await
            .unwrap();
        assert_eq!(resp.temperature, 0.9);

        let resp = gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap();
        assert_eq!(resp.temperature, 0.2, "falls back to the provider config");
    }

    #[tokio::test]
    async fn empty_prompt_rejected_without_a_call() {
        let mock = Arc::new(MockProvider::new("mock"));
        let gateway = gateway_with(mock.clone());

        let err = gateway
            .collect(Uuid::new_v4(), "c", "mock", "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyPrompt));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_and_disabled_providers_rejected() {
        let mock = Arc::new(MockProvider::new("mock"));
        let mut snapshot = test_snapshot();
        snapshot.providers[0].enabled = false;
        let mut gateway = ProviderGateway::new(&snapshot);
        gateway.register(mock);

        let err = gateway.collect(Uuid::new_v4(), "c", "nope", "p", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(_)));

        let err = gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Disabled(_)));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let mock = Arc::new(MockProvider::new("mock"));
        mock.push_failure(ProviderError::RateLimited { provider: "mock".into() });
        mock.push_failure(ProviderError::Timeout { provider: "mock".into() });
        mock.push_reply(MockProvider::canned_reply("eventually"));
        let gateway = gateway_with(mock.clone());

        let resp = gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap();
        assert_eq!(resp.standardized.content, "eventually");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_not_retried() {
        let mock = Arc::new(MockProvider::new("mock"));
        mock.push_failure(ProviderError::Auth { provider: "mock".into() });
        let gateway = gateway_with(mock.clone());

        let err = gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert_eq!(mock.call_count(), 1);

        let usage = gateway.usage().await;
        assert_eq!(usage["mock"].failures, 1);
    }

    #[tokio::test]
    async fn retries_exhausted_surface_the_last_error() {
        let mock = Arc::new(MockProvider::new("mock"));
        for _ in 0..10 {
            mock.push_failure(ProviderError::Timeout { provider: "mock".into() });
        }
        let gateway = gateway_with(mock.clone());

        let err = gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        // initial attempt plus max_retries
        assert_eq!(mock.call_count() as u32, test_snapshot().tuning.max_retries + 1);
    }

    #[tokio::test]
    async fn usage_accumulates_cost_and_calls() {
        let mock = Arc::new(MockProvider::new("mock"));
        let gateway = gateway_with(mock);

        gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap();
        gateway.collect(Uuid::new_v4(), "c", "mock", "p", None).await.unwrap();

        let usage = gateway.usage().await;
        assert_eq!(usage["mock"].calls, 2);
        assert_eq!(usage["mock"].failures, 0);
        assert!((usage["mock"].total_cost - 0.02).abs() < 1e-9);
    }
}
