//! Conflict-resolved merging.
//!
//! Collapses a category's validated tables into one trusted fact set.
//! When two sources disagree on a (row key, field) pair the winner is
//! chosen by source priority, then validation confidence, then recency,
//! and the loss is recorded as an audit entry.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::config::CategoryConfig;
use crate::models::{
    ConflictReason, ConflictRecord, MergeMethod, MergedDataResult, MergedFact,
    SourceValidationResult,
};

/// Fallback merges are capped at this confidence.
const FALLBACK_CONFIDENCE_CAP: f32 = 0.2;
const LOW_CONFIDENCE_CUTOFF: f32 = 0.3;

struct Candidate {
    row_key: String,
    field: String,
    value: String,
    source: String,
    priority: u32,
    confidence: f32,
    created_at: String,
}

/// Merge one category's validation results into a single trusted answer.
///
/// Every collected row competes, validated or not: unvalidated rows carry
/// the lowest priority and zero authority, so they only win a field no
/// trusted source covers, and their losses are logged as conflicts.
pub fn merge_category(
    request_id: Uuid,
    category: &CategoryConfig,
    validations: &[SourceValidationResult],
) -> MergedDataResult {
    let contributors: Vec<&SourceValidationResult> =
        validations.iter().filter(|v| v.total_rows > 0).collect();
    let passing: Vec<&SourceValidationResult> = contributors
        .iter()
        .copied()
        .filter(|v| v.validation_passed)
        .collect();
    let fallback = passing.is_empty();

    let method = if fallback {
        MergeMethod::LowConfidenceFallback
    } else if passing.len() == 1 {
        MergeMethod::SingleSource
    } else {
        MergeMethod::AuthorityWeighted
    };

    let mut groups: BTreeMap<(String, String), Vec<Candidate>> = BTreeMap::new();
    for result in &contributors {
        for candidate in candidates_from(result) {
            groups
                .entry((candidate.row_key.to_lowercase(), candidate.field.to_lowercase()))
                .or_default()
                .push(candidate);
        }
    }

    let mut merged = MergedDataResult::new(request_id, &category.id, method);
    merged.sources_merged = contributors.len() as u32;

    let total_groups = groups.len();
    for (_, mut candidates) in groups {
        candidates.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
                .then(b.created_at.cmp(&a.created_at))
        });

        let mut distinct: Vec<String> = Vec::new();
        for c in &candidates {
            let v = c.value.trim().to_string();
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }

        let winner = &candidates[0];
        if distinct.len() > 1 {
            let loser = candidates
                .iter()
                .find(|c| c.value.trim() != winner.value.trim())
                .unwrap_or(&candidates[1]);
            merged.conflicts.push(ConflictRecord {
                row_key: winner.row_key.clone(),
                field: winner.field.clone(),
                competing_values: distinct,
                winning_value: winner.value.clone(),
                winning_source: winner.source.clone(),
                losing_source: loser.source.clone(),
                reason: resolution_reason(winner, loser),
            });
        }
        merged.facts.push(MergedFact {
            row_key: winner.row_key.clone(),
            field: winner.field.clone(),
            value: winner.value.clone(),
            source: winner.source.clone(),
            priority: winner.priority,
        });
    }

    let scored = if fallback { &contributors } else { &passing };
    merged.merge_confidence =
        merge_confidence(scored, fallback, merged.conflicts.len(), total_groups);
    merged.low_confidence = fallback || merged.merge_confidence < LOW_CONFIDENCE_CUTOFF;
    merged.key_findings = key_findings(&merged.facts);

    debug!(
        category = category.id,
        facts = merged.facts.len(),
        conflicts = merged.conflicts.len(),
        confidence = merged.merge_confidence,
        "category merged"
    );
    merged
}

/// Expand one validation result into per-field fact candidates. Rows that
/// did not validate still compete at the bottom of the priority order, with
/// unsourced rows attributed to the provider.
fn candidates_from(result: &SourceValidationResult) -> Vec<Candidate> {
    let mut out = Vec::new();
    for row in &result.rows {
        if row.row_key.is_empty() {
            continue;
        }
        let Some(table) = result.tables.get(row.table_index) else { continue };
        let Some(cells) = table.rows.get(row.row_index) else { continue };
        let source_col = table.source_column();
        let key_col = (0..cells.len()).find(|i| Some(*i) != source_col);

        for (i, header) in table.headers.iter().enumerate() {
            if Some(i) == source_col || Some(i) == key_col {
                continue;
            }
            let Some(value) = cells.get(i) else { continue };
            if value.trim().is_empty() {
                continue;
            }
            out.push(Candidate {
                row_key: row.row_key.clone(),
                field: header.clone(),
                value: value.trim().to_string(),
                source: row
                    .source_name
                    .clone()
                    .unwrap_or_else(|| result.provider_id.clone()),
                priority: row.source_priority.unwrap_or(u32::MAX),
                confidence: result.validation_score,
                created_at: result.created_at.clone(),
            });
        }
    }
    out
}

fn resolution_reason(winner: &Candidate, loser: &Candidate) -> ConflictReason {
    if winner.priority != loser.priority {
        ConflictReason::Authority
    } else if (winner.confidence - loser.confidence).abs() > f32::EPSILON {
        ConflictReason::Confidence
    } else {
        ConflictReason::Recency
    }
}

/// Authority-weighted mean of contributor scores, discounted by the fraction
/// of merged fields that conflicted.
fn merge_confidence(
    contributors: &[&SourceValidationResult],
    fallback: bool,
    conflicts: usize,
    total_groups: usize,
) -> f32 {
    if contributors.is_empty() {
        return 0.0;
    }
    let mut weight_sum = 0.0f32;
    let mut weighted = 0.0f32;
    for result in contributors {
        let weight = result.top_authority().max(0.1);
        weight_sum += weight;
        weighted += weight * result.validation_score;
    }
    let base = weighted / weight_sum;

    if fallback {
        return (base * 0.25).min(FALLBACK_CONFIDENCE_CAP);
    }
    let conflict_fraction = if total_groups > 0 {
        conflicts as f32 / total_groups as f32
    } else {
        0.0
    };
    (base * (1.0 - 0.5 * conflict_fraction)).clamp(0.0, 1.0)
}

fn key_findings(facts: &[MergedFact]) -> Vec<String> {
    let mut ranked: Vec<&MergedFact> = facts.iter().collect();
    ranked.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.row_key.cmp(&b.row_key)));
    ranked
        .iter()
        .take(5)
        .map(|f| format!("{}: {} = {} ({})", f.row_key, f.field, f.value, f.source))
        .collect()
}
