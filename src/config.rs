//! Immutable configuration snapshot.
//!
//! Everything the pipeline needs — categories, providers, route rubrics and
//! tuning knobs — is loaded once (from a JSON file or the built-in defaults)
//! and passed explicitly into the orchestrator. A running pipeline never
//! reads ambient configuration, so a run stays reproducible even if the
//! configuration file changes mid-run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DeliveryRoute, ProviderKind, SourceType};

pub const APP_NAME: &str = "PharmSight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `RUST_LOG`-style filter when the env var is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// One entry of a category's source-authority ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAuthority {
    /// Matched case-insensitively as a substring of the cited source.
    pub name: String,
    /// 1 is the most trusted.
    pub priority: u32,
    /// Weight in [0, 1] used for validation and merge scoring.
    pub authority: f32,
    pub source_type: SourceType,
}

/// Validation schema for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSchema {
    /// Minimum number of sources that must pass validation.
    pub min_sources: u32,
    /// At least one validated row must come from a source at or above this authority.
    pub authority_threshold: f32,
    /// Table headers expected somewhere in the category's validated tables.
    pub required_fields: Vec<String>,
    /// A source passes when its validation score exceeds this and it has rows.
    pub pass_threshold: f32,
}

impl Default for ValidationSchema {
    fn default() -> Self {
        Self {
            min_sources: 1,
            authority_threshold: 0.6,
            required_fields: vec![],
            pass_threshold: 0.7,
        }
    }
}

/// One thematic line of inquiry about the drug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: String,
    pub name: String,
    /// `{drug}` is replaced with the request's drug name.
    pub prompt_template: String,
    pub phase: u32,
    pub weight: f32,
    pub sources: Vec<SourceAuthority>,
    pub validation: ValidationSchema,
}

impl CategoryConfig {
    pub fn render_prompt(&self, drug_name: &str) -> String {
        self.prompt_template.replace("{drug}", drug_name)
    }

    /// Resolve a cited source against this category's authority list.
    pub fn match_source(&self, cited: &str) -> Option<&SourceAuthority> {
        let cited = cited.to_lowercase();
        self.sources
            .iter()
            .find(|s| cited.contains(&s.name.to_lowercase()))
    }
}

/// One external intelligence provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Minimum interval between calls to this provider.
    pub min_interval_ms: u64,
    /// Per-call deadline; exceeding it is a transient failure.
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Flat cost estimate per call, used for usage accounting.
    pub cost_per_call: f64,
}

/// One scoring band of a piecewise rubric: [min, max) → score.
/// Open ends are expressed by omitting min or max.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricBand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub score: u8,
}

impl RubricBand {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value < m)
    }
}

/// Rubric for one scored parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRubric {
    pub parameter: String,
    /// Alternate names the extractor also accepts (case-insensitive).
    pub aliases: Vec<String>,
    pub unit: String,
    pub weight: f32,
    pub bands: Vec<RubricBand>,
}

impl ParameterRubric {
    /// Map a value through the piecewise bands; 0 when no band matches.
    pub fn score_value(&self, value: f64) -> u8 {
        self.bands
            .iter()
            .find(|b| b.contains(value))
            .map(|b| b.score)
            .unwrap_or(0)
    }
}

/// Fixed parameter list and weights for one delivery route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRubric {
    pub route: DeliveryRoute,
    pub parameters: Vec<ParameterRubric>,
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTuning {
    /// Bound on simultaneous outbound provider calls.
    pub max_concurrent_provider_calls: usize,
    /// Retry cap for transient provider failures.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Request fails when failed categories / total exceeds this ratio.
    pub failure_tolerance: f32,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            max_concurrent_provider_calls: 4,
            max_retries: 3,
            backoff_base_ms: 250,
            backoff_max_ms: 5_000,
            failure_tolerance: 0.5,
        }
    }
}

/// The immutable snapshot handed to the orchestrator at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub categories: Vec<CategoryConfig>,
    pub providers: Vec<ProviderConfig>,
    pub rubrics: Vec<RouteRubric>,
    pub tuning: PipelineTuning,
}

impl ConfigSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: ConfigSnapshot = serde_json::from_str(&text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".into()));
        }
        if !self.providers.iter().any(|p| p.enabled) {
            return Err(ConfigError::Invalid("no enabled providers".into()));
        }
        for cat in &self.categories {
            if cat.prompt_template.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category {} has an empty prompt template",
                    cat.id
                )));
            }
        }
        Ok(())
    }

    pub fn category(&self, id: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    pub fn rubric(&self, route: DeliveryRoute) -> Option<&RouteRubric> {
        self.rubrics.iter().find(|r| r.route == route)
    }

    /// Built-in defaults: the standard category set, two providers, and the
    /// transdermal/transmucosal scoring rubrics.
    pub fn default_snapshot() -> Self {
        Self {
            categories: default_categories(),
            providers: vec![
                ProviderConfig {
                    id: "aurora-search".into(),
                    kind: ProviderKind::Search,
                    enabled: true,
                    base_url: Some("http://localhost:8091/v1/answer".into()),
                    min_interval_ms: 1_000,
                    timeout_secs: 60,
                    temperature: 0.0,
                    cost_per_call: 0.005,
                },
                ProviderConfig {
                    id: "helios-llm".into(),
                    kind: ProviderKind::Llm,
                    enabled: true,
                    base_url: Some("http://localhost:8092/v1/answer".into()),
                    min_interval_ms: 500,
                    timeout_secs: 120,
                    temperature: 0.2,
                    cost_per_call: 0.02,
                },
            ],
            rubrics: vec![transdermal_rubric(), transmucosal_rubric()],
            tuning: PipelineTuning::default(),
        }
    }
}

/// The standard source-authority ranking shared by the default categories.
fn default_sources() -> Vec<SourceAuthority> {
    vec![
        SourceAuthority { name: "FDA label".into(), priority: 1, authority: 1.0, source_type: SourceType::Regulatory },
        SourceAuthority { name: "FDA".into(), priority: 1, authority: 1.0, source_type: SourceType::Regulatory },
        SourceAuthority { name: "EMA".into(), priority: 2, authority: 0.95, source_type: SourceType::Regulatory },
        SourceAuthority { name: "PubMed".into(), priority: 3, authority: 0.85, source_type: SourceType::PeerReviewed },
        SourceAuthority { name: "ClinicalTrials.gov".into(), priority: 4, authority: 0.8, source_type: SourceType::ClinicalRegistry },
        SourceAuthority { name: "DrugBank".into(), priority: 5, authority: 0.7, source_type: SourceType::Industry },
        SourceAuthority { name: "manufacturer".into(), priority: 6, authority: 0.5, source_type: SourceType::Industry },
        SourceAuthority { name: "wikipedia".into(), priority: 7, authority: 0.3, source_type: SourceType::Web },
    ]
}

fn default_categories() -> Vec<CategoryConfig> {
    let template = |focus: &str| {
        format!(
            "For the drug {{drug}}, compile {focus}. Answer with a markdown table whose \
             columns include a Source column citing where each row was found."
        )
    };
    vec![
        CategoryConfig {
            id: "market_overview".into(),
            name: "Market Overview".into(),
            prompt_template: template("current market size, originator, patent status and key competitors"),
            phase: 1,
            weight: 0.15,
            sources: default_sources(),
            validation: ValidationSchema::default(),
        },
        CategoryConfig {
            id: "physicochemical".into(),
            name: "Physicochemical Profile".into(),
            prompt_template: template(
                "dose, molecular weight, melting point, logP, half-life and protein binding",
            ),
            phase: 1,
            weight: 0.25,
            sources: default_sources(),
            validation: ValidationSchema {
                min_sources: 1,
                authority_threshold: 0.6,
                required_fields: vec!["Parameter".into(), "Value".into()],
                pass_threshold: 0.7,
            },
        },
        CategoryConfig {
            id: "clinical_evidence".into(),
            name: "Clinical Evidence".into(),
            prompt_template: template("approved indications, pivotal trials and efficacy findings"),
            phase: 2,
            weight: 0.25,
            sources: default_sources(),
            validation: ValidationSchema::default(),
        },
        CategoryConfig {
            id: "safety_profile".into(),
            name: "Safety Profile".into(),
            prompt_template: template("major adverse events, contraindications and boxed warnings"),
            phase: 2,
            weight: 0.2,
            sources: default_sources(),
            validation: ValidationSchema::default(),
        },
        CategoryConfig {
            id: "regulatory_status".into(),
            name: "Regulatory Status".into(),
            prompt_template: template("approval history, exclusivities and pending applications"),
            phase: 3,
            weight: 0.15,
            sources: default_sources(),
            validation: ValidationSchema::default(),
        },
    ]
}

/// Transdermal feasibility rubric. Bands follow the classic patch-candidate
/// criteria: low dose, MW under ~500 Da, moderate lipophilicity, low melting
/// point, short half-life, moderate protein binding.
fn transdermal_rubric() -> RouteRubric {
    RouteRubric {
        route: DeliveryRoute::Transdermal,
        parameters: vec![
            ParameterRubric {
                parameter: "Dose".into(),
                aliases: vec!["daily dose".into(), "dose per day".into()],
                unit: "mg".into(),
                weight: 0.25,
                bands: vec![
                    RubricBand { min: None, max: Some(10.0), score: 9 },
                    RubricBand { min: Some(10.0), max: Some(20.0), score: 7 },
                    RubricBand { min: Some(20.0), max: Some(50.0), score: 4 },
                    RubricBand { min: Some(50.0), max: Some(100.0), score: 2 },
                    RubricBand { min: Some(100.0), max: None, score: 0 },
                ],
            },
            ParameterRubric {
                parameter: "Molecular Weight".into(),
                aliases: vec!["MW".into(), "molar mass".into()],
                unit: "Da".into(),
                weight: 0.2,
                bands: vec![
                    RubricBand { min: None, max: Some(400.0), score: 9 },
                    RubricBand { min: Some(400.0), max: Some(500.0), score: 7 },
                    RubricBand { min: Some(500.0), max: Some(600.0), score: 4 },
                    RubricBand { min: Some(600.0), max: None, score: 1 },
                ],
            },
            ParameterRubric {
                parameter: "Melting Point".into(),
                aliases: vec!["mp".into()],
                unit: "°C".into(),
                weight: 0.15,
                bands: vec![
                    RubricBand { min: None, max: Some(150.0), score: 9 },
                    RubricBand { min: Some(150.0), max: Some(200.0), score: 6 },
                    RubricBand { min: Some(200.0), max: Some(250.0), score: 3 },
                    RubricBand { min: Some(250.0), max: None, score: 1 },
                ],
            },
            ParameterRubric {
                parameter: "LogP".into(),
                aliases: vec!["partition coefficient".into(), "log p".into()],
                unit: "".into(),
                weight: 0.2,
                bands: vec![
                    RubricBand { min: Some(1.0), max: Some(3.0), score: 9 },
                    RubricBand { min: Some(0.0), max: Some(1.0), score: 6 },
                    RubricBand { min: Some(3.0), max: Some(4.0), score: 6 },
                    RubricBand { min: Some(-1.0), max: Some(0.0), score: 3 },
                    RubricBand { min: Some(4.0), max: Some(5.0), score: 3 },
                    RubricBand { min: None, max: Some(-1.0), score: 1 },
                    RubricBand { min: Some(5.0), max: None, score: 1 },
                ],
            },
            ParameterRubric {
                parameter: "Half-Life".into(),
                aliases: vec!["elimination half-life".into(), "t1/2".into()],
                unit: "h".into(),
                weight: 0.1,
                bands: vec![
                    RubricBand { min: None, max: Some(4.0), score: 9 },
                    RubricBand { min: Some(4.0), max: Some(10.0), score: 6 },
                    RubricBand { min: Some(10.0), max: Some(24.0), score: 4 },
                    RubricBand { min: Some(24.0), max: None, score: 2 },
                ],
            },
            ParameterRubric {
                parameter: "Protein Binding".into(),
                aliases: vec!["plasma protein binding".into()],
                unit: "%".into(),
                weight: 0.1,
                bands: vec![
                    RubricBand { min: None, max: Some(70.0), score: 9 },
                    RubricBand { min: Some(70.0), max: Some(90.0), score: 6 },
                    RubricBand { min: Some(90.0), max: Some(97.0), score: 4 },
                    RubricBand { min: Some(97.0), max: None, score: 2 },
                ],
            },
        ],
    }
}

/// Transmucosal feasibility rubric: tolerates higher MW and logP than the
/// transdermal route, but is stricter on dose.
fn transmucosal_rubric() -> RouteRubric {
    RouteRubric {
        route: DeliveryRoute::Transmucosal,
        parameters: vec![
            ParameterRubric {
                parameter: "Dose".into(),
                aliases: vec!["daily dose".into(), "dose per day".into()],
                unit: "mg".into(),
                weight: 0.3,
                bands: vec![
                    RubricBand { min: None, max: Some(5.0), score: 9 },
                    RubricBand { min: Some(5.0), max: Some(15.0), score: 7 },
                    RubricBand { min: Some(15.0), max: Some(30.0), score: 4 },
                    RubricBand { min: Some(30.0), max: None, score: 1 },
                ],
            },
            ParameterRubric {
                parameter: "Molecular Weight".into(),
                aliases: vec!["MW".into(), "molar mass".into()],
                unit: "Da".into(),
                weight: 0.25,
                bands: vec![
                    RubricBand { min: None, max: Some(500.0), score: 9 },
                    RubricBand { min: Some(500.0), max: Some(700.0), score: 6 },
                    RubricBand { min: Some(700.0), max: None, score: 2 },
                ],
            },
            ParameterRubric {
                parameter: "LogP".into(),
                aliases: vec!["partition coefficient".into(), "log p".into()],
                unit: "".into(),
                weight: 0.25,
                bands: vec![
                    RubricBand { min: Some(1.0), max: Some(4.0), score: 9 },
                    RubricBand { min: Some(0.0), max: Some(1.0), score: 6 },
                    RubricBand { min: Some(4.0), max: Some(5.0), score: 5 },
                    RubricBand { min: None, max: Some(0.0), score: 2 },
                    RubricBand { min: Some(5.0), max: None, score: 2 },
                ],
            },
            ParameterRubric {
                parameter: "Half-Life".into(),
                aliases: vec!["elimination half-life".into(), "t1/2".into()],
                unit: "h".into(),
                weight: 0.2,
                bands: vec![
                    RubricBand { min: None, max: Some(6.0), score: 9 },
                    RubricBand { min: Some(6.0), max: Some(12.0), score: 6 },
                    RubricBand { min: Some(12.0), max: None, score: 3 },
                ],
            },
        ],
    }
}
