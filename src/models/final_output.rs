use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Decision, DeliveryRoute, InvestmentPriority, RiskLevel, Verdict};
use super::now_ts;

/// Per-route feasibility entry in the suitability matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSuitability {
    pub route: DeliveryRoute,
    pub overall_score: f32,
    /// Achieved / max possible score, as a percentage.
    pub feasibility_pct: f32,
    pub verdict: Verdict,
}

/// Data coverage scorecard: how many categories produced merged data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCoverage {
    pub categories_total: u32,
    pub categories_with_data: u32,
    /// Categories whose merged result is flagged low-confidence.
    pub categories_low_confidence: u32,
    pub coverage_pct: f32,
}

/// The final decision document. At most one per request; immutable once
/// written (uniqueness enforced by the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalOutput {
    pub id: Uuid,
    pub request_id: Uuid,
    /// Technical-development composite, 0–9 (best route feasibility).
    pub td_score: f32,
    /// Technical-manufacturing composite, 0–9 (data quality × coverage).
    pub tm_score: f32,
    pub decision: Decision,
    pub investment_priority: InvestmentPriority,
    pub risk_level: RiskLevel,
    pub suitability: Vec<RouteSuitability>,
    pub coverage: DataCoverage,
    pub recommendations: Vec<String>,
    /// The full assembled decision document.
    pub document: serde_json::Value,
    pub created_at: String,
}

impl FinalOutput {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: Uuid,
        td_score: f32,
        tm_score: f32,
        decision: Decision,
        investment_priority: InvestmentPriority,
        risk_level: RiskLevel,
        suitability: Vec<RouteSuitability>,
        coverage: DataCoverage,
        recommendations: Vec<String>,
        document: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            td_score,
            tm_score,
            decision,
            investment_priority,
            risk_level,
            suitability,
            coverage,
            recommendations,
            document,
            created_at: now_ts(),
        }
    }
}
