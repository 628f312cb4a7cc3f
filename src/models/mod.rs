//! Domain types for the assessment pipeline.
//!
//! Everything downstream of the request is append-only: records are created
//! once and superseded by newer records (latest `created_at` wins), never
//! updated in place. Only the request's status/progress fields mutate, and
//! only through the orchestrator.

pub mod enums;
pub mod request;
pub mod response;
pub mod validation;
pub mod merge;
pub mod scoring;
pub mod final_output;

pub use enums::*;
pub use request::AssessmentRequest;
pub use response::{ExtractedTable, ProviderResponse, StandardizedResponse};
pub use validation::{CategoryValidation, RowValidation, SourceValidationResult, StepResult};
pub use merge::{ConflictRecord, MergedDataResult, MergedFact};
pub use scoring::{ParameterScore, RouteScore};
pub use final_output::{DataCoverage, FinalOutput, RouteSuitability};

use chrono::Utc;

/// Timestamp format used for every persisted record.
///
/// Millisecond precision so `created_at` strings order lexicographically in
/// creation order, which the merger relies on for recency tie-breaks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC timestamp in the persisted format.
pub fn now_ts() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
