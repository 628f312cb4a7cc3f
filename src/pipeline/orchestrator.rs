//! Pipeline orchestration.
//!
//! Drives one request through collect, verify, merge and summarize with a
//! hard barrier between stages. Provider calls fan out per (category,
//! provider) under a concurrency bound; every other stage works off
//! persisted records, so a crashed run leaves nothing half-merged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ConfigSnapshot;
use crate::db::{repository, Store};
use crate::models::{
    AssessmentRequest, DeliveryRoute, FinalOutput, MergedDataResult, RequestStatus, RouteScore,
};
use crate::providers::{ProviderGateway, ProviderUsage};

use super::aggregator::aggregate_category;
use super::error::PipelineError;
use super::final_output::assemble_final_output;
use super::merger::merge_category;
use super::notify::{NoopNotifier, PipelineEvent, PipelineNotifier};
use super::scoring::score_route;
use super::validator::validate_source;

// Progress shares per stage, in percent.
const COLLECT_END: f32 = 40.0;
const VERIFY_END: f32 = 65.0;
const MERGE_END: f32 = 85.0;

struct RunHandle {
    cancel: Arc<AtomicBool>,
}

/// Pipeline stages in execution order. A restart enters at the first stage
/// whose persisted records are incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Collect,
    Verify,
    Merge,
    Summarize,
}

pub struct Orchestrator {
    store: Store,
    config: Arc<ConfigSnapshot>,
    gateway: Arc<ProviderGateway>,
    notifier: Arc<dyn PipelineNotifier>,
    runs: Mutex<HashMap<Uuid, RunHandle>>,
}

impl Orchestrator {
    pub fn new(store: Store, config: ConfigSnapshot, gateway: ProviderGateway) -> Self {
        Self {
            store,
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            notifier: Arc::new(NoopNotifier),
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PipelineNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Create and persist a new assessment request.
    ///
    /// Omitted categories default to the full configured set; omitted routes
    /// default to every route a rubric exists for.
    pub fn submit_request(
        &self,
        drug_name: &str,
        categories: Option<Vec<String>>,
        routes: Option<Vec<DeliveryRoute>>,
    ) -> Result<AssessmentRequest, PipelineError> {
        let drug_name = drug_name.trim();
        if drug_name.is_empty() {
            return Err(PipelineError::Config("drug name is empty".into()));
        }

        let categories = match categories {
            Some(ids) => {
                for id in &ids {
                    if self.config.category(id).is_none() {
                        return Err(PipelineError::Config(format!("unknown category: {id}")));
                    }
                }
                ids
            }
            None => self.config.categories.iter().map(|c| c.id.clone()).collect(),
        };
        if categories.is_empty() {
            return Err(PipelineError::Config("no categories selected".into()));
        }
        let routes = routes.unwrap_or_else(|| DeliveryRoute::all().to_vec());

        let request = AssessmentRequest::new(drug_name, categories, routes);
        self.store.with(|c| repository::insert_request(c, &request))?;
        info!(request_id = %request.id, drug = request.drug_name, "request submitted");
        Ok(request)
    }

    /// Launch the pipeline for a submitted, interrupted, failed or
    /// cancelled request. A restart resumes after the last stage whose
    /// records are fully persisted, so an interrupted run does not repay
    /// provider calls; new records supersede the previous run's by
    /// timestamp. Completed requests are immutable.
    ///
    /// At most one run is active per request: starting a request that is
    /// already running is a no-op that returns the current status.
    pub async fn start_pipeline(
        self: &Arc<Self>,
        request_id: Uuid,
    ) -> Result<RequestStatus, PipelineError> {
        let mut runs = self.runs.lock().await;
        let request = self.store.with(|c| repository::get_request(c, request_id))?;
        if runs.contains_key(&request_id) {
            debug!(request_id = %request_id, status = %request.status, "pipeline already running");
            return Ok(request.status);
        }
        if request.status == RequestStatus::Completed {
            return Err(PipelineError::Terminal {
                id: request_id,
                status: request.status.to_string(),
            });
        }

        // Flip to collecting before the task spawns so a caller polling
        // right after this returns never sees the pre-run status.
        self.set_status(request_id, RequestStatus::Collecting, None)?;
        self.set_progress(request_id, 0.0)?;

        let cancel = Arc::new(AtomicBool::new(false));
        runs.insert(request_id, RunHandle { cancel: cancel.clone() });
        drop(runs);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(request_id, cancel).await;
        });
        Ok(RequestStatus::Collecting)
    }

    /// Signal a running pipeline to stop at the next checkpoint.
    /// Returns false when no run is active for the request.
    pub async fn cancel_pipeline(&self, request_id: Uuid) -> bool {
        let runs = self.runs.lock().await;
        match runs.get(&request_id) {
            Some(handle) => {
                handle.cancel.store(true, Ordering::SeqCst);
                info!(request_id = %request_id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn request_status(&self, request_id: Uuid) -> Result<AssessmentRequest, PipelineError> {
        Ok(self.store.with(|c| repository::get_request(c, request_id))?)
    }

    pub fn final_output(&self, request_id: Uuid) -> Result<FinalOutput, PipelineError> {
        Ok(self.store.with(|c| repository::get_final_output(c, request_id))?)
    }

    pub fn merged_results(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<MergedDataResult>, PipelineError> {
        Ok(self.store.with(|c| repository::latest_merged_results(c, request_id))?)
    }

    pub async fn provider_usage(&self) -> HashMap<String, ProviderUsage> {
        self.gateway.usage().await
    }

    async fn run(self: Arc<Self>, request_id: Uuid, cancel: Arc<AtomicBool>) {
        let result = self.run_inner(request_id, &cancel).await;
        match &result {
            Ok(()) => info!(request_id = %request_id, "pipeline completed"),
            Err(PipelineError::Cancelled) => {
                info!(request_id = %request_id, "pipeline cancelled");
                if let Err(status_err) = self.set_status(request_id, RequestStatus::Cancelled, None)
                {
                    warn!(request_id = %request_id, error = %status_err, "failed to persist cancelled status");
                }
            }
            Err(err) => {
                warn!(request_id = %request_id, error = %err, "pipeline failed");
                if let Err(status_err) =
                    self.set_status(request_id, RequestStatus::Failed, Some(&err.to_string()))
                {
                    warn!(request_id = %request_id, error = %status_err, "failed to persist failed status");
                }
            }
        }

        if let Ok(request) = self.store.with(|c| repository::get_request(c, request_id)) {
            self.notifier
                .notify(&PipelineEvent {
                    request_id,
                    drug_name: request.drug_name,
                    status: request.status,
                    error_reason: request.error_reason,
                })
                .await;
        }
        self.runs.lock().await.remove(&request_id);
    }

    async fn run_inner(
        &self,
        request_id: Uuid,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), PipelineError> {
        let request = self.store.with(|c| repository::get_request(c, request_id))?;
        let resume = self.resume_point(&request)?;
        if resume > Stage::Collect {
            info!(request_id = %request_id, stage = ?resume, "resuming from persisted stage records");
        }

        if resume <= Stage::Collect {
            self.collect_stage(&request, cancel).await?;
            checkpoint(cancel)?;
        }

        if resume <= Stage::Verify {
            self.set_status(request_id, RequestStatus::Verifying, None)?;
            self.verify_stage(&request)?;
            checkpoint(cancel)?;
        }

        if resume <= Stage::Merge {
            self.set_status(request_id, RequestStatus::Merging, None)?;
            self.merge_stage(&request)?;
            checkpoint(cancel)?;
        }

        self.set_status(request_id, RequestStatus::Summarizing, None)?;
        self.summarize_stage(&request)?;

        self.set_status(request_id, RequestStatus::Completed, None)?;
        self.set_progress(request_id, 100.0)?;
        Ok(())
    }

    /// First stage whose persisted records do not cover every requested
    /// category. A fresh request has no records and starts at collection;
    /// a run that died during summarize re-enters there without repaying
    /// any provider call.
    fn resume_point(&self, request: &AssessmentRequest) -> Result<Stage, PipelineError> {
        let covers = |have: &[&str]| request.categories.iter().all(|c| have.contains(&c.as_str()));

        let merged = self.store.with(|c| repository::latest_merged_results(c, request.id))?;
        let merged_ids: Vec<&str> = merged.iter().map(|m| m.category_id.as_str()).collect();
        if covers(&merged_ids) {
            return Ok(Stage::Summarize);
        }

        let validations = self
            .store
            .with(|c| repository::latest_category_validations(c, request.id))?;
        let validated_ids: Vec<&str> =
            validations.iter().map(|v| v.category_id.as_str()).collect();
        if covers(&validated_ids) {
            return Ok(Stage::Merge);
        }

        for category_id in &request.categories {
            let responses = self
                .store
                .with(|c| repository::get_provider_responses(c, request.id, category_id))?;
            if responses.is_empty() {
                return Ok(Stage::Collect);
            }
        }
        Ok(Stage::Verify)
    }

    /// Fan out one prompt per (category, enabled provider) under the
    /// concurrency bound. A category fails collection only when every
    /// provider failed for it.
    async fn collect_stage(
        &self,
        request: &AssessmentRequest,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), PipelineError> {
        let provider_ids: Vec<String> =
            self.config.enabled_providers().map(|p| p.id.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.tuning.max_concurrent_provider_calls));
        let mut join: JoinSet<(String, bool)> = JoinSet::new();

        for category_id in &request.categories {
            let category = self
                .config
                .category(category_id)
                .ok_or_else(|| PipelineError::Config(format!("unknown category: {category_id}")))?;
            let prompt = category.render_prompt(&request.drug_name);

            for provider_id in &provider_ids {
                let gateway = self.gateway.clone();
                let store = self.store.clone();
                let cancel = cancel.clone();
                let semaphore = semaphore.clone();
                let category_id = category_id.clone();
                let provider_id = provider_id.clone();
                let prompt = prompt.clone();
                let request_id = request.id;

                join.spawn(async move {
                    if cancel.load(Ordering::SeqCst) {
                        return (category_id, false);
                    }
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (category_id, false);
                    };
                    match gateway
                        .collect(request_id, &category_id, &provider_id, &prompt, None)
                        .await
                    {
                        Ok(response) => {
                            let stored = store
                                .with(|c| repository::insert_provider_response(c, &response));
                            if let Err(err) = &stored {
                                warn!(category = category_id, error = %err, "failed to persist response");
                            }
                            (category_id, stored.is_ok())
                        }
                        Err(err) => {
                            warn!(category = category_id, provider = provider_id, error = %err, "collection failed");
                            (category_id, false)
                        }
                    }
                });
            }
        }

        let total_tasks = (request.categories.len() * provider_ids.len()).max(1);
        let mut successes: HashMap<String, u32> = HashMap::new();
        let mut done = 0usize;
        while let Some(joined) = join.join_next().await {
            if let Ok((category_id, ok)) = joined {
                done += 1;
                if ok {
                    *successes.entry(category_id).or_default() += 1;
                }
                let _ = self.set_progress(
                    request.id,
                    done as f32 / total_tasks as f32 * COLLECT_END,
                );
            }
        }
        checkpoint(cancel)?;

        let failed = request
            .categories
            .iter()
            .filter(|c| successes.get(*c).copied().unwrap_or(0) == 0)
            .count();
        let ratio = failed as f32 / request.categories.len().max(1) as f32;
        if ratio > self.config.tuning.failure_tolerance {
            return Err(PipelineError::FailureToleranceExceeded {
                failed,
                total: request.categories.len(),
            });
        }
        Ok(())
    }

    /// Validate every stored response, then aggregate per category.
    fn verify_stage(&self, request: &AssessmentRequest) -> Result<(), PipelineError> {
        let total = request.categories.len().max(1);
        for (i, category_id) in request.categories.iter().enumerate() {
            let category = self
                .config
                .category(category_id)
                .ok_or_else(|| PipelineError::Config(format!("unknown category: {category_id}")))?;

            let responses = self
                .store
                .with(|c| repository::get_provider_responses(c, request.id, category_id))?;
            for response in &responses {
                let result = validate_source(request.id, response, category);
                self.store.with(|c| repository::insert_source_validation(c, &result))?;
            }

            let results = self
                .store
                .with(|c| repository::latest_source_validations(c, request.id, category_id))?;
            let aggregate = aggregate_category(request.id, category, &results);
            debug!(
                category = category_id,
                passed = aggregate.validation_passed,
                failed_steps = aggregate.failed_steps,
                "category validated"
            );
            self.store.with(|c| repository::insert_category_validation(c, &aggregate))?;

            self.set_progress(
                request.id,
                COLLECT_END + (i + 1) as f32 / total as f32 * (VERIFY_END - COLLECT_END),
            )?;
        }
        Ok(())
    }

    fn merge_stage(&self, request: &AssessmentRequest) -> Result<(), PipelineError> {
        let total = request.categories.len().max(1);
        for (i, category_id) in request.categories.iter().enumerate() {
            let category = self
                .config
                .category(category_id)
                .ok_or_else(|| PipelineError::Config(format!("unknown category: {category_id}")))?;
            let results = self
                .store
                .with(|c| repository::latest_source_validations(c, request.id, category_id))?;
            let merged = merge_category(request.id, category, &results);
            self.store.with(|c| repository::insert_merged_result(c, &merged))?;

            self.set_progress(
                request.id,
                VERIFY_END + (i + 1) as f32 / total as f32 * (MERGE_END - VERIFY_END),
            )?;
        }
        Ok(())
    }

    /// Score routes and write the decision document. Finalization is
    /// first-write-wins; a concurrent or repeated run keeps the stored
    /// document.
    fn summarize_stage(&self, request: &AssessmentRequest) -> Result<(), PipelineError> {
        let merged = self
            .store
            .with(|c| repository::latest_merged_results(c, request.id))?;
        let validations = self
            .store
            .with(|c| repository::latest_category_validations(c, request.id))?;

        let mut routes: Vec<RouteScore> = Vec::with_capacity(request.routes.len());
        for route in &request.routes {
            let rubric = self
                .config
                .rubric(*route)
                .ok_or_else(|| PipelineError::MissingRubric(route.to_string()))?;
            let score = score_route(request.id, rubric, &merged);
            for parameter in &score.parameters {
                self.store.with(|c| repository::insert_parameter_score(c, parameter))?;
            }
            routes.push(score);
        }

        let output = assemble_final_output(request, &self.config, &routes, &merged, &validations);
        let wrote = self
            .store
            .with(|c| repository::insert_final_output_once(c, &output))?;
        if !wrote {
            debug!(request_id = %request.id, "final output already stored, keeping it");
        }
        Ok(())
    }

    fn set_status(
        &self,
        request_id: Uuid,
        status: RequestStatus,
        reason: Option<&str>,
    ) -> Result<(), PipelineError> {
        debug!(request_id = %request_id, status = %status, "status change");
        Ok(self
            .store
            .with(|c| repository::update_request_status(c, request_id, status, reason))?)
    }

    fn set_progress(&self, request_id: Uuid, progress: f32) -> Result<(), PipelineError> {
        Ok(self
            .store
            .with(|c| repository::update_request_progress(c, request_id, progress))?)
    }
}

fn checkpoint(cancel: &Arc<AtomicBool>) -> Result<(), PipelineError> {
    if cancel.load(Ordering::SeqCst) {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use crate::config::ProviderConfig;
    use crate::models::{
        Decision, ExtractedTable, ProviderKind, ProviderResponse, StandardizedResponse,
    };
    use crate::providers::{IntelligenceProvider, MockProvider, ProviderError, ProviderReply};

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
        snapshot.tuning.backoff_max_ms = 2;
        snapshot
    }

    fn orchestrator_with(client: Arc<dyn IntelligenceProvider>) -> Arc<Orchestrator> {
        let snapshot = test_snapshot();
        let mut gateway = ProviderGateway::new(&snapshot);
        gateway.register(client);
        Arc::new(Orchestrator::new(
            Store::open_in_memory().unwrap(),
            snapshot,
            gateway,
        ))
    }

    async fn wait_terminal(orch: &Orchestrator, id: Uuid) -> AssessmentRequest {
        for _ in 0..500 {
            let request = orch.request_status(id).unwrap();
            if request.status.is_terminal() {
                return request;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pipeline did not reach a terminal state");
    }

    struct SlowProvider;

    /// Fails the market overview and regulatory status prompts, answers
    /// everything else.
    struct CategoryOutageProvider;

    #[async_trait]
    impl IntelligenceProvider for CategoryOutageProvider {
        fn id(&self) -> &str {
            "mock"
        }

        async fn call(&self, prompt: &str, _t: f32) -> Result<ProviderReply, ProviderError> {
            if prompt.contains("market size") || prompt.contains("approval history") {
                return Err(ProviderError::Auth { provider: "mock".into() });
            }
            Ok(MockProvider::canned_reply("answer"))
        }
    }

    #[async_trait]
    impl IntelligenceProvider for SlowProvider {
        fn id(&self) -> &str {
            "mock"
        }

        async fn call(&self, _prompt: &str, _t: f32) -> Result<ProviderReply, ProviderError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(MockProvider::canned_reply("slow answer"))
        }
    }

    #[tokio::test]
    async fn full_pipeline_completes_with_decision() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        let request = orch.submit_request("apixaban", None, None).unwrap();
        assert_eq!(request.categories.len(), 5);
        assert_eq!(request.status, RequestStatus::Submitted);

        orch.start_pipeline(request.id).await.unwrap();
        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed);
        assert_eq!(finished.progress, 100.0);

        let merged = orch.merged_results(request.id).unwrap();
        assert_eq!(merged.len(), 5);

        let output = orch.final_output(request.id).unwrap();
        assert_eq!(output.request_id, request.id);
        assert_eq!(output.suitability.len(), 2);
        assert_eq!(output.coverage.categories_total, 5);

        let usage = orch.provider_usage().await;
        assert_eq!(usage["mock"].calls, 5);
    }

    #[tokio::test]
    async fn submit_rejects_unknown_category_and_empty_name() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        let err = orch
            .submit_request("apixaban", Some(vec!["nope".into()]), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = orch.submit_request("   ", None, None).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[tokio::test]
    async fn second_start_is_a_noop_while_running() {
        let orch = orchestrator_with(Arc::new(SlowProvider));
        let request = orch.submit_request("apixaban", None, None).unwrap();

        orch.start_pipeline(request.id).await.unwrap();
        let status = orch.start_pipeline(request.id).await.unwrap();
        assert!(!status.is_terminal(), "no-op returns the in-flight status");

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed);
        // one run only: one response per (category, provider) pair
        assert_eq!(orch.provider_usage().await["mock"].calls, 5);
    }

    #[tokio::test]
    async fn completed_request_cannot_be_restarted() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        let request = orch.submit_request("apixaban", None, None).unwrap();
        orch.start_pipeline(request.id).await.unwrap();
        wait_terminal(&orch, request.id).await;

        let err = orch.start_pipeline(request.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Terminal { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_at_the_next_checkpoint() {
        let orch = orchestrator_with(Arc::new(SlowProvider));
        let request = orch.submit_request("apixaban", None, None).unwrap();
        orch.start_pipeline(request.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(orch.cancel_pipeline(request.id).await);

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Cancelled);
        assert!(orch.final_output(request.id).is_err(), "no decision for a cancelled run");
    }

    #[tokio::test]
    async fn cancel_without_a_run_is_a_noop() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        assert!(!orch.cancel_pipeline(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn total_provider_failure_fails_the_request() {
        let mock = Arc::new(MockProvider::new("mock"));
        // one permanent failure per (category, provider) pair
        for _ in 0..5 {
            mock.push_failure(ProviderError::Auth { provider: "mock".into() });
        }
        let orch = orchestrator_with(mock);
        let request = orch.submit_request("apixaban", None, None).unwrap();
        orch.start_pipeline(request.id).await.unwrap();

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Failed);
        assert!(finished.error_reason.is_some());
        assert!(orch.final_output(request.id).is_err());

        // A failed request can be rerun; with the scripted failures drained
        // the provider answers normally and the retry completes.
        orch.start_pipeline(request.id).await.unwrap();
        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed);
        assert!(finished.error_reason.is_none());
        assert!(orch.final_output(request.id).is_ok());
    }

    #[tokio::test]
    async fn restart_skips_collection_when_responses_are_persisted() {
        let snapshot = test_snapshot();
        let store = Store::open_in_memory().unwrap();
        let mut gateway = ProviderGateway::new(&snapshot);
        let mock = Arc::new(MockProvider::new("mock"));
        gateway.register(mock.clone());
        let orch = Arc::new(Orchestrator::new(store.clone(), snapshot, gateway));

        let request = orch.submit_request("apixaban", None, None).unwrap();
        // records an interrupted earlier run left behind
        for category_id in &request.categories {
            let reply = MockProvider::canned_reply("recovered");
            let standardized = StandardizedResponse {
                provider_id: "mock".into(),
                kind: ProviderKind::Llm,
                category_id: category_id.clone(),
                content: reply.content,
                tables: reply.tables,
                quality: reply.quality,
                confidence: reply.confidence,
                relevance: reply.relevance,
            };
            let response =
                ProviderResponse::new(request.id, reply.raw, standardized, 0.2, 0.01, 5);
            store.with(|c| repository::insert_provider_response(c, &response)).unwrap();
        }

        orch.start_pipeline(request.id).await.unwrap();
        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed);
        assert_eq!(mock.call_count(), 0, "collection is not repeated on resume");
        assert_eq!(orch.merged_results(request.id).unwrap().len(), 5);
        assert!(orch.final_output(request.id).is_ok());
    }

    #[tokio::test]
    async fn minority_category_failures_degrade_instead_of_failing() {
        let orch = orchestrator_with(Arc::new(CategoryOutageProvider));
        let request = orch.submit_request("apixaban", None, None).unwrap();
        orch.start_pipeline(request.id).await.unwrap();

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed, "2 of 5 is within tolerance");

        let merged = orch.merged_results(request.id).unwrap();
        assert_eq!(merged.len(), 5);
        let empty: Vec<_> = merged.iter().filter(|m| m.facts.is_empty()).collect();
        assert_eq!(empty.len(), 2, "failed categories merge to empty records");
        assert!(empty.iter().all(|m| m.low_confidence));
        assert!(orch.final_output(request.id).is_ok());
    }

    #[tokio::test]
    async fn run_on_a_missing_request_survives_status_write_failure() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        // both the run and the terminal status write fail; neither panics
        orch.clone().run(Uuid::new_v4(), Arc::new(AtomicBool::new(false))).await;
        assert!(orch.runs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unsourced_data_completes_low_confidence() {
        let mock = Arc::new(MockProvider::new("mock"));
        for _ in 0..10 {
            mock.push_reply(ProviderReply {
                raw: "raw".into(),
                content: "answer".into(),
                tables: vec![ExtractedTable {
                    title: None,
                    headers: vec!["Parameter".into(), "Value".into(), "Source".into()],
                    rows: vec![vec!["Dose".into(), "5 mg".into(), "random blog".into()]],
                }],
                quality: 0.5,
                confidence: 0.5,
                relevance: 0.5,
            });
        }
        let orch = orchestrator_with(mock);
        let request = orch.submit_request("apixaban", None, None).unwrap();
        orch.start_pipeline(request.id).await.unwrap();

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed, "weak data degrades, it does not fail");

        let merged = orch.merged_results(request.id).unwrap();
        assert!(merged.iter().all(|m| m.low_confidence));
        assert!(merged.iter().all(|m| m.merge_confidence <= 0.2));

        let output = orch.final_output(request.id).unwrap();
        assert_eq!(output.coverage.categories_low_confidence, 5);
        assert_eq!(output.decision, Decision::NoGo);
    }

    #[tokio::test]
    async fn subset_of_categories_runs_alone() {
        let orch = orchestrator_with(Arc::new(MockProvider::new("mock")));
        let request = orch
            .submit_request("apixaban", Some(vec!["physicochemical".into()]), None)
            .unwrap();
        orch.start_pipeline(request.id).await.unwrap();

        let finished = wait_terminal(&orch, request.id).await;
        assert_eq!(finished.status, RequestStatus::Completed);
        assert_eq!(orch.merged_results(request.id).unwrap().len(), 1);
    }
}
