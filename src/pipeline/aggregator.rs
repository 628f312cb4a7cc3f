//! Category-level validation aggregate.
//!
//! Rolls the per-provider validation results of one category into an
//! ordered list of checks. Mandatory steps gate the category; optional
//! steps only add to the confidence penalty.

use uuid::Uuid;

use crate::config::CategoryConfig;
use crate::models::{CategoryValidation, SourceValidationResult, StepResult};

const MANDATORY_PENALTY: f32 = 0.3;
const OPTIONAL_PENALTY: f32 = 0.2;

/// Aggregate all of a category's source validation results into one record.
pub fn aggregate_category(
    request_id: Uuid,
    category: &CategoryConfig,
    results: &[SourceValidationResult],
) -> CategoryValidation {
    let steps = vec![
        minimum_source_count(category, results),
        authority_threshold(category, results),
        data_completeness(category, results),
        row_validation_rate(results),
    ];

    let mut penalty = 0.0f32;
    let mut recommendations = Vec::new();
    for step in steps.iter().filter(|s| !s.passed) {
        penalty += if step.mandatory { MANDATORY_PENALTY } else { OPTIONAL_PENALTY };
        recommendations.push(recommendation_for(&step.step_id, category));
    }

    let mut validation = CategoryValidation::new(request_id, &category.id, steps);
    validation.confidence_penalty = penalty.min(1.0);
    validation.recommendations = recommendations;
    validation
}

fn minimum_source_count(
    category: &CategoryConfig,
    results: &[SourceValidationResult],
) -> StepResult {
    let required = category.validation.min_sources.max(1);
    let passing = results.iter().filter(|r| r.validation_passed).count() as u32;
    StepResult {
        step_id: "minimum_source_count".into(),
        label: "Minimum source count".into(),
        passed: passing >= required,
        mandatory: true,
        score: (passing as f32 / required as f32).min(1.0),
        message: format!("{passing} of {required} required sources passed validation"),
    }
}

fn authority_threshold(
    category: &CategoryConfig,
    results: &[SourceValidationResult],
) -> StepResult {
    let threshold = category.validation.authority_threshold;
    let best = results
        .iter()
        .map(|r| r.top_authority())
        .fold(0.0f32, f32::max);
    StepResult {
        step_id: "authority_threshold".into(),
        label: "Authority threshold".into(),
        passed: best >= threshold,
        mandatory: true,
        score: if threshold > 0.0 { (best / threshold).min(1.0) } else { 1.0 },
        message: format!("best validated authority {best:.2}, threshold {threshold:.2}"),
    }
}

fn data_completeness(
    category: &CategoryConfig,
    results: &[SourceValidationResult],
) -> StepResult {
    let required = &category.validation.required_fields;
    let found = required
        .iter()
        .filter(|field| {
            let needle = field.to_lowercase();
            results.iter().any(|r| {
                r.tables.iter().any(|t| {
                    t.headers.iter().any(|h| h.to_lowercase().contains(&needle))
                })
            })
        })
        .count();
    let passed = found == required.len();
    StepResult {
        step_id: "data_completeness".into(),
        label: "Data completeness".into(),
        passed,
        mandatory: false,
        score: if required.is_empty() { 1.0 } else { found as f32 / required.len() as f32 },
        message: format!("{found} of {} required fields present", required.len()),
    }
}

fn row_validation_rate(results: &[SourceValidationResult]) -> StepResult {
    let total: u32 = results.iter().map(|r| r.total_rows).sum();
    let validated: u32 = results.iter().map(|r| r.validated_rows).sum();
    let rate = if total > 0 { validated as f32 / total as f32 } else { 0.0 };
    StepResult {
        step_id: "row_validation_rate".into(),
        label: "Row validation rate".into(),
        passed: rate >= 0.5,
        mandatory: false,
        score: rate,
        message: format!("{validated} of {total} rows validated"),
    }
}

fn recommendation_for(step_id: &str, category: &CategoryConfig) -> String {
    match step_id {
        "minimum_source_count" => format!(
            "Collect additional sources for {} until at least {} pass validation",
            category.name, category.validation.min_sources
        ),
        "authority_threshold" => format!(
            "Confirm {} data against a regulatory-grade source",
            category.name
        ),
        "data_completeness" => format!(
            "Fill the missing required fields for {}",
            category.name
        ),
        "row_validation_rate" => format!(
            "Re-query providers for {}; most returned rows lack usable citations",
            category.name
        ),
        _ => format!("Review {} validation output", category.name),
    }
}
