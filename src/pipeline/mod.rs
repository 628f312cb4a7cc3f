//! The assessment pipeline: collect, verify, merge, summarize.

pub mod error;
pub mod validator;
pub mod aggregator;
pub mod merger;
pub mod scoring;
pub mod final_output;
pub mod notify;
pub mod orchestrator;

pub use error::PipelineError;
pub use notify::{NoopNotifier, PipelineEvent, PipelineNotifier, WebhookNotifier};
pub use orchestrator::Orchestrator;
