//! Row-level source validation.
//!
//! Every extracted table row must cite its source. The citation is resolved
//! against the category's configured authority ranking; the row passes,
//! fails or gets flagged, and the per-response score is the
//! authority-weighted fraction of rows that passed.

use uuid::Uuid;

use crate::config::CategoryConfig;
use crate::models::{
    now_ts, ProviderResponse, RowOutcome, RowValidation, SourceValidationResult,
};

/// Sources below this authority are flagged rather than passed.
const LOW_AUTHORITY_CUTOFF: f32 = 0.5;

/// Validate one provider response against the category's source rules.
pub fn validate_source(
    request_id: Uuid,
    response: &ProviderResponse,
    category: &CategoryConfig,
) -> SourceValidationResult {
    let mut rows = Vec::new();

    for (table_index, table) in response.standardized.tables.iter().enumerate() {
        let source_col = table.source_column();
        for (row_index, cells) in table.rows.iter().enumerate() {
            rows.push(validate_row(category, source_col, table_index, row_index, cells));
        }
    }

    let total_rows = rows.len() as u32;
    let validated_rows = rows.iter().filter(|r| r.outcome == RowOutcome::Passed).count() as u32;
    let failed_rows = rows.iter().filter(|r| r.outcome == RowOutcome::Failed).count() as u32;
    let flagged_rows = total_rows - validated_rows - failed_rows;

    // Authority-weighted pass fraction: a validated FDA row counts for more
    // than a validated low-tier row, and unvalidated rows drag with full weight.
    let mut weight_sum = 0.0f32;
    let mut passed_sum = 0.0f32;
    for row in &rows {
        let weight = if row.authority > 0.0 { row.authority } else { 1.0 };
        weight_sum += weight;
        if row.outcome == RowOutcome::Passed {
            passed_sum += weight;
        }
    }
    let validation_score = if weight_sum > 0.0 { passed_sum / weight_sum } else { 0.0 };
    let validation_passed =
        total_rows > 0 && validation_score > category.validation.pass_threshold;

    SourceValidationResult {
        id: Uuid::new_v4(),
        request_id,
        category_id: category.id.clone(),
        provider_id: response.provider_id.clone(),
        tables: response.standardized.tables.clone(),
        rows,
        total_rows,
        validated_rows,
        failed_rows,
        flagged_rows,
        validation_score,
        validation_passed,
        created_at: now_ts(),
    }
}

fn validate_row(
    category: &CategoryConfig,
    source_col: Option<usize>,
    table_index: usize,
    row_index: usize,
    cells: &[String],
) -> RowValidation {
    let row_key = cells
        .iter()
        .enumerate()
        .find(|(i, _)| Some(*i) != source_col)
        .map(|(_, c)| c.trim().to_string())
        .unwrap_or_default();

    let cited = source_col
        .and_then(|i| cells.get(i))
        .map(|c| c.trim())
        .unwrap_or("");

    if cited.is_empty() {
        return RowValidation {
            table_index,
            row_index,
            row_key,
            outcome: RowOutcome::Failed,
            reason: Some("no source cited".into()),
            source_name: None,
            source_priority: None,
            source_type: None,
            authority: 0.0,
        };
    }

    match category.match_source(cited) {
        Some(source) if source.authority >= LOW_AUTHORITY_CUTOFF => RowValidation {
            table_index,
            row_index,
            row_key,
            outcome: RowOutcome::Passed,
            reason: None,
            source_name: Some(source.name.clone()),
            source_priority: Some(source.priority),
            source_type: Some(source.source_type),
            authority: source.authority,
        },
        Some(source) => RowValidation {
            table_index,
            row_index,
            row_key,
            outcome: RowOutcome::Flagged,
            reason: Some("low-authority source".into()),
            source_name: Some(source.name.clone()),
            source_priority: Some(source.priority),
            source_type: Some(source.source_type),
            authority: source.authority,
        },
        None => RowValidation {
            table_index,
            row_index,
            row_key,
            outcome: RowOutcome::Flagged,
            reason: Some("unrecognized source".into()),
            source_name: Some(cited.to_string()),
            source_priority: None,
            source_type: None,
            authority: 0.0,
        },
    }
}
