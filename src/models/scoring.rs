use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DeliveryRoute, Verdict};
use super::now_ts;

/// Score for one physicochemical/clinical parameter against one route rubric.
///
/// Invariant: `weighted_score == raw_score as f32 * weight`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterScore {
    pub id: Uuid,
    pub request_id: Uuid,
    pub route: DeliveryRoute,
    pub parameter: String,
    /// Extracted numeric value; None when missing after merge.
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Rubric score, 0–9.
    pub raw_score: u8,
    pub weight: f32,
    pub weighted_score: f32,
    /// The parameter was absent after merge; scored as zero.
    pub missing: bool,
    pub created_at: String,
}

impl ParameterScore {
    pub fn new(
        request_id: Uuid,
        route: DeliveryRoute,
        parameter: &str,
        value: Option<f64>,
        unit: Option<String>,
        raw_score: u8,
        weight: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            route,
            parameter: parameter.to_string(),
            value,
            unit,
            raw_score,
            weight,
            weighted_score: raw_score as f32 * weight,
            missing: value.is_none(),
            created_at: now_ts(),
        }
    }
}

/// Overall feasibility of one delivery route, normalized to 0–9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteScore {
    pub route: DeliveryRoute,
    /// Sum of weighted scores normalized to the 0–9 scale.
    pub overall: f32,
    /// Maximum achievable weighted sum for the rubric.
    pub max_possible: f32,
    pub verdict: Verdict,
    pub parameters: Vec<ParameterScore>,
}

impl RouteScore {
    /// Achieved / max-possible, as a percentage.
    pub fn feasibility_pct(&self) -> f32 {
        if self.max_possible <= 0.0 {
            return 0.0;
        }
        let achieved: f32 = self.parameters.iter().map(|p| p.weighted_score).sum();
        (achieved / self.max_possible * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_score_invariant() {
        let score = ParameterScore::new(
            Uuid::new_v4(),
            DeliveryRoute::Transdermal,
            "Dose",
            Some(5.0),
            Some("mg".into()),
            7,
            0.25,
        );
        assert!((score.weighted_score - 1.75).abs() < f32::EPSILON);
        assert!(!score.missing);
    }

    #[test]
    fn missing_parameter_scores_zero() {
        let score = ParameterScore::new(
            Uuid::new_v4(),
            DeliveryRoute::Transdermal,
            "Molecular Weight",
            None,
            None,
            0,
            0.2,
        );
        assert!(score.missing);
        assert_eq!(score.raw_score, 0);
        assert_eq!(score.weighted_score, 0.0);
    }

    #[test]
    fn feasibility_pct_bounds() {
        let request_id = Uuid::new_v4();
        let params = vec![
            ParameterScore::new(request_id, DeliveryRoute::Transdermal, "Dose", Some(5.0), None, 9, 0.5),
            ParameterScore::new(request_id, DeliveryRoute::Transdermal, "LogP", Some(2.0), None, 9, 0.5),
        ];
        let score = RouteScore {
            route: DeliveryRoute::Transdermal,
            overall: 9.0,
            max_possible: 9.0,
            verdict: Verdict::Favorable,
            parameters: params,
        };
        assert!((score.feasibility_pct() - 100.0).abs() < 0.01);
    }

    #[test]
    fn feasibility_pct_zero_max() {
        let score = RouteScore {
            route: DeliveryRoute::Transmucosal,
            overall: 0.0,
            max_possible: 0.0,
            verdict: Verdict::Unfavorable,
            parameters: vec![],
        };
        assert_eq!(score.feasibility_pct(), 0.0);
    }
}
