use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProviderKind;
use super::now_ts;

/// One table extracted from a provider answer: ordered headers and rows.
///
/// By convention a column whose header contains "source" (case-insensitive)
/// carries the citation for each row; the validator resolves it against the
/// category's authority list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Index of the source/citation column, if the table has one.
    pub fn source_column(&self) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.to_lowercase().contains("source"))
    }
}

/// Provider answer normalized at the gateway boundary into one fixed shape,
/// so validator and merger never branch on provider identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizedResponse {
    pub provider_id: String,
    pub kind: ProviderKind,
    pub category_id: String,
    /// Narrative answer text (tables removed).
    pub content: String,
    pub tables: Vec<ExtractedTable>,
    /// Provider-reported answer quality in [0, 1].
    pub quality: f32,
    /// Provider-reported confidence in [0, 1].
    pub confidence: f32,
    /// Relevance of the answer to the category prompt in [0, 1].
    pub relevance: f32,
}

/// One persisted provider answer for one (request, category, provider) at a
/// given temperature. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub category_id: String,
    pub provider_id: String,
    pub temperature: f32,
    pub raw_response: String,
    pub standardized: StandardizedResponse,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub created_at: String,
}

impl ProviderResponse {
    pub fn new(
        request_id: Uuid,
        raw_response: String,
        standardized: StandardizedResponse,
        temperature: f32,
        cost_estimate: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            category_id: standardized.category_id.clone(),
            provider_id: standardized.provider_id.clone(),
            temperature,
            raw_response,
            standardized,
            cost_estimate,
            latency_ms,
            created_at: now_ts(),
        }
    }

    /// Total extracted rows across all tables.
    pub fn row_count(&self) -> usize {
        self.standardized.tables.iter().map(|t| t.rows.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> ExtractedTable {
        ExtractedTable {
            title: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: vec![],
        }
    }

    #[test]
    fn source_column_found_case_insensitive() {
        assert_eq!(table(&["Parameter", "Value", "Source"]).source_column(), Some(2));
        assert_eq!(table(&["Parameter", "Data source", "Value"]).source_column(), Some(1));
    }

    #[test]
    fn source_column_absent() {
        assert_eq!(table(&["Parameter", "Value"]).source_column(), None);
    }

    #[test]
    fn row_count_spans_tables() {
        let std = StandardizedResponse {
            provider_id: "p1".into(),
            kind: ProviderKind::Llm,
            category_id: "c1".into(),
            content: String::new(),
            tables: vec![
                ExtractedTable {
                    title: None,
                    headers: vec!["a".into()],
                    rows: vec![vec!["1".into()], vec!["2".into()]],
                },
                ExtractedTable {
                    title: None,
                    headers: vec!["b".into()],
                    rows: vec![vec!["3".into()]],
                },
            ],
            quality: 0.9,
            confidence: 0.8,
            relevance: 0.7,
        };
        let resp = ProviderResponse::new(Uuid::new_v4(), "raw".into(), std, 0.2, 0.01, 120);
        assert_eq!(resp.row_count(), 3);
        assert_eq!(resp.provider_id, "p1");
        assert_eq!(resp.category_id, "c1");
    }
}
