use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ConflictReason, MergeMethod};
use super::now_ts;

/// One merged fact: the trusted value for a (row key, field) pair together
/// with the source it was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedFact {
    pub row_key: String,
    pub field: String,
    pub value: String,
    /// Cited source name, or the provider id when the row had no recognized source.
    pub source: String,
    /// Configured priority of the winning source (lower is more trusted);
    /// u32::MAX when the source is unrecognized.
    pub priority: u32,
}

/// Audit record of one resolved merge conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub row_key: String,
    pub field: String,
    /// All distinct competing values, winning value first.
    pub competing_values: Vec<String>,
    pub winning_value: String,
    pub winning_source: String,
    pub losing_source: String,
    pub reason: ConflictReason,
}

/// The single trusted answer for one category after conflict resolution.
/// Exactly one non-superseded record per (request, category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedDataResult {
    pub id: Uuid,
    pub request_id: Uuid,
    pub category_id: String,
    pub method: MergeMethod,
    /// In [0, 1]; discounted by the fraction of fields that conflicted.
    pub merge_confidence: f32,
    pub low_confidence: bool,
    pub facts: Vec<MergedFact>,
    pub conflicts: Vec<ConflictRecord>,
    pub key_findings: Vec<String>,
    pub sources_merged: u32,
    pub created_at: String,
}

impl MergedDataResult {
    pub fn new(request_id: Uuid, category_id: &str, method: MergeMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            category_id: category_id.to_string(),
            method,
            merge_confidence: 0.0,
            low_confidence: false,
            facts: Vec::new(),
            conflicts: Vec::new(),
            key_findings: Vec::new(),
            sources_merged: 0,
            created_at: now_ts(),
        }
    }

    /// Look up a merged value by row key (case-insensitive).
    pub fn value_for(&self, row_key: &str) -> Option<&MergedFact> {
        let needle = row_key.to_lowercase();
        self.facts
            .iter()
            .find(|f| f.row_key.to_lowercase() == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_for_is_case_insensitive() {
        let mut merged = MergedDataResult::new(Uuid::new_v4(), "cat", MergeMethod::SingleSource);
        merged.facts.push(MergedFact {
            row_key: "Molecular Weight".into(),
            field: "Value".into(),
            value: "459.5 Da".into(),
            source: "FDA label".into(),
            priority: 1,
        });
        assert!(merged.value_for("molecular weight").is_some());
        assert!(merged.value_for("dose").is_none());
    }
}
