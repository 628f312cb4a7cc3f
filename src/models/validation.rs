use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RowOutcome, SourceType};
use super::now_ts;
use super::response::ExtractedTable;

/// Validation outcome for a single extracted table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowValidation {
    pub table_index: usize,
    pub row_index: usize,
    /// First non-source cell; identifies the fact for merging.
    pub row_key: String,
    pub outcome: RowOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    /// Authority weight of the matched source in [0, 1]; 0 when unmatched.
    pub authority: f32,
}

/// Per (category, provider) validation result. Append-only: a re-validation
/// writes a new record that supersedes this one by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceValidationResult {
    pub id: Uuid,
    pub request_id: Uuid,
    pub category_id: String,
    pub provider_id: String,
    pub tables: Vec<ExtractedTable>,
    pub rows: Vec<RowValidation>,
    pub total_rows: u32,
    pub validated_rows: u32,
    pub failed_rows: u32,
    pub flagged_rows: u32,
    /// Authority-weighted validated fraction, in [0, 1].
    pub validation_score: f32,
    pub validation_passed: bool,
    pub created_at: String,
}

impl SourceValidationResult {
    /// Highest authority among rows that passed validation.
    pub fn top_authority(&self) -> f32 {
        self.rows
            .iter()
            .filter(|r| r.outcome == RowOutcome::Passed)
            .map(|r| r.authority)
            .fold(0.0, f32::max)
    }
}

/// One ordered validation step in a category aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub label: String,
    pub passed: bool,
    pub mandatory: bool,
    /// Step score in [0, 1].
    pub score: f32,
    pub message: String,
}

/// Aggregate of all source validation results for one category.
/// Latest record per (request, category) wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryValidation {
    pub id: Uuid,
    pub request_id: Uuid,
    pub category_id: String,
    pub steps: Vec<StepResult>,
    /// Sum of failed-step penalties, capped at 1.0.
    pub confidence_penalty: f32,
    pub failed_steps: u32,
    /// All mandatory steps passed.
    pub validation_passed: bool,
    pub recommendations: Vec<String>,
    pub created_at: String,
}

impl CategoryValidation {
    pub fn new(request_id: Uuid, category_id: &str, steps: Vec<StepResult>) -> Self {
        let failed: Vec<&StepResult> = steps.iter().filter(|s| !s.passed).collect();
        let failed_steps = failed.len() as u32;
        let validation_passed = steps.iter().filter(|s| s.mandatory).all(|s| s.passed);
        Self {
            id: Uuid::new_v4(),
            request_id,
            category_id: category_id.to_string(),
            steps,
            confidence_penalty: 0.0,
            failed_steps,
            validation_passed,
            recommendations: Vec::new(),
            created_at: now_ts(),
        }
    }
}
