//! Decision document assembly.
//!
//! Folds route scores and merged data quality into the two composite
//! scores, applies the fixed decision matrix and builds the full document.

use serde_json::json;
use uuid::Uuid;

use crate::config::ConfigSnapshot;
use crate::models::{
    now_ts, AssessmentRequest, CategoryValidation, DataCoverage, Decision, FinalOutput,
    InvestmentPriority, MergedDataResult, RiskLevel, RouteScore, RouteSuitability,
};

/// Technical-development composite: feasibility of the best delivery route.
pub fn td_score(routes: &[RouteScore]) -> f32 {
    routes.iter().map(|r| r.overall).fold(0.0, f32::max)
}

/// Technical-manufacturing composite: mean merge confidence scaled by data
/// coverage, normalized to the same 0-9 scale as the route scores.
pub fn tm_score(merged: &[MergedDataResult], categories_total: usize) -> f32 {
    if merged.is_empty() || categories_total == 0 {
        return 0.0;
    }
    let mean_confidence: f32 =
        merged.iter().map(|m| m.merge_confidence).sum::<f32>() / merged.len() as f32;
    let coverage = merged.len() as f32 / categories_total as f32;
    (mean_confidence * coverage * 9.0).clamp(0.0, 9.0)
}

pub fn decide(td: f32, tm: f32) -> Decision {
    if td < 4.0 || tm < 3.0 {
        Decision::NoGo
    } else if td >= 7.0 && tm >= 5.0 {
        Decision::Go
    } else {
        Decision::Conditional
    }
}

pub fn priority(td: f32, tm: f32) -> InvestmentPriority {
    if td >= 7.0 && tm >= 6.0 {
        InvestmentPriority::High
    } else if td < 5.0 {
        InvestmentPriority::Low
    } else {
        InvestmentPriority::Medium
    }
}

pub fn risk(td: f32, tm: f32) -> RiskLevel {
    let floor = td.min(tm);
    if floor >= 7.0 {
        RiskLevel::Low
    } else if floor < 4.0 {
        RiskLevel::High
    } else {
        RiskLevel::Moderate
    }
}

/// Assemble the final decision document from all upstream stage outputs.
pub fn assemble_final_output(
    request: &AssessmentRequest,
    config: &ConfigSnapshot,
    routes: &[RouteScore],
    merged: &[MergedDataResult],
    validations: &[CategoryValidation],
) -> FinalOutput {
    let categories_total = request.categories.len().max(1) as u32;
    let categories_with_data = merged.iter().filter(|m| !m.facts.is_empty()).count() as u32;
    let categories_low_confidence = merged.iter().filter(|m| m.low_confidence).count() as u32;
    let coverage = DataCoverage {
        categories_total,
        categories_with_data,
        categories_low_confidence,
        coverage_pct: categories_with_data as f32 / categories_total as f32 * 100.0,
    };

    let td = td_score(routes);
    let tm = tm_score(merged, request.categories.len());
    let decision = decide(td, tm);

    let suitability: Vec<RouteSuitability> = routes
        .iter()
        .map(|r| RouteSuitability {
            route: r.route,
            overall_score: r.overall,
            feasibility_pct: r.feasibility_pct(),
            verdict: r.verdict,
        })
        .collect();

    let recommendations = recommendations(routes, merged, validations, config);
    let document = build_document(request, td, tm, decision, &suitability, merged, &coverage, &recommendations);

    FinalOutput::new(
        request.id,
        td,
        tm,
        decision,
        priority(td, tm),
        risk(td, tm),
        suitability,
        coverage,
        recommendations,
        document,
    )
}

fn recommendations(
    routes: &[RouteScore],
    merged: &[MergedDataResult],
    validations: &[CategoryValidation],
    config: &ConfigSnapshot,
) -> Vec<String> {
    let mut out = Vec::new();

    for route in routes {
        for param in route.parameters.iter().filter(|p| p.missing) {
            let line = format!("Source a value for {} before committing to a route", param.parameter);
            if !out.contains(&line) {
                out.push(line);
            }
        }
    }
    for m in merged.iter().filter(|m| m.low_confidence) {
        let name = config
            .category(&m.category_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| m.category_id.clone());
        out.push(format!("Treat {name} data as provisional; merge confidence is low"));
    }
    for v in validations {
        for rec in &v.recommendations {
            if !out.contains(rec) {
                out.push(rec.clone());
            }
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn build_document(
    request: &AssessmentRequest,
    td: f32,
    tm: f32,
    decision: Decision,
    suitability: &[RouteSuitability],
    merged: &[MergedDataResult],
    coverage: &DataCoverage,
    recommendations: &[String],
) -> serde_json::Value {
    json!({
        "drug_name": request.drug_name,
        "request_id": request.id,
        "generated_at": now_ts(),
        "scores": { "td": td, "tm": tm },
        "decision": decision,
        "routes": suitability,
        "coverage": coverage,
        "categories": merged.iter().map(|m| json!({
            "category_id": m.category_id,
            "method": m.method,
            "merge_confidence": m.merge_confidence,
            "low_confidence": m.low_confidence,
            "sources_merged": m.sources_merged,
            "key_findings": m.key_findings,
            "conflicts": m.conflicts.len(),
        })).collect::<Vec<_>>(),
        "recommendations": recommendations,
    })
}
