//! Route feasibility scoring.
//!
//! Looks merged facts up by parameter name (or alias), extracts a numeric
//! value, maps it through the route rubric's piecewise bands and combines
//! the weighted results into a 0-9 feasibility score.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::config::{ParameterRubric, RouteRubric};
use crate::models::{MergedDataResult, ParameterScore, RouteScore, Verdict};

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // unwrap: the pattern is a compile-time constant
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap())
}

/// First numeric token in a merged value, e.g. "459.5 Da" or "~5 mg/day".
pub fn extract_numeric(value: &str) -> Option<f64> {
    number_pattern()
        .find(value)
        .and_then(|m| m.as_str().parse().ok())
}

/// Find the merged fact for a rubric parameter across all categories.
fn lookup<'a>(
    rubric: &ParameterRubric,
    merged: &'a [MergedDataResult],
) -> Option<(&'a str, f64)> {
    let mut names: Vec<String> = vec![rubric.parameter.to_lowercase()];
    names.extend(rubric.aliases.iter().map(|a| a.to_lowercase()));

    for result in merged {
        for fact in &result.facts {
            let key = fact.row_key.to_lowercase();
            if names.iter().any(|n| key == *n || key.contains(n.as_str())) {
                if let Some(value) = extract_numeric(&fact.value) {
                    return Some((fact.value.as_str(), value));
                }
            }
        }
    }
    None
}

/// Score one delivery route against the merged data.
///
/// A parameter absent after merge scores zero with its `missing` flag set;
/// it still appears in the output so the gap is visible downstream.
pub fn score_route(
    request_id: Uuid,
    rubric: &RouteRubric,
    merged: &[MergedDataResult],
) -> RouteScore {
    let mut parameters = Vec::with_capacity(rubric.parameters.len());
    for param in &rubric.parameters {
        let score = match lookup(param, merged) {
            Some((_, value)) => ParameterScore::new(
                request_id,
                rubric.route,
                &param.parameter,
                Some(value),
                Some(param.unit.clone()).filter(|u| !u.is_empty()),
                param.score_value(value),
                param.weight,
            ),
            None => {
                debug!(route = %rubric.route, parameter = param.parameter, "parameter missing after merge");
                ParameterScore::new(
                    request_id,
                    rubric.route,
                    &param.parameter,
                    None,
                    None,
                    0,
                    param.weight,
                )
            }
        };
        parameters.push(score);
    }

    let achieved: f32 = parameters.iter().map(|p| p.weighted_score).sum();
    let max_possible: f32 = parameters.iter().map(|p| p.weight * 9.0).sum();
    let overall = if max_possible > 0.0 {
        achieved / max_possible * 9.0
    } else {
        0.0
    };

    RouteScore {
        route: rubric.route,
        overall,
        max_possible,
        verdict: Verdict::from_score(overall),
        parameters,
    }
}
