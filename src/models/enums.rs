//! String-backed enums shared across the pipeline and the persistence layer.

use serde::{Deserialize, Serialize};

/// Lifecycle of an assessment request.
///
/// `submitted → collecting → verifying → merging → summarizing → completed`,
/// with `failed` and `cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    Collecting,
    Verifying,
    Merging,
    Summarizing,
    Completed,
    Failed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Collecting => "collecting",
            Self::Verifying => "verifying",
            Self::Merging => "merging",
            Self::Summarizing => "summarizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "collecting" => Some(Self::Collecting),
            "verifying" => Some(Self::Verifying),
            "merging" => Some(Self::Merging),
            "summarizing" => Some(Self::Summarizing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery routes the scoring engine knows rubrics for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryRoute {
    Transdermal,
    Transmucosal,
}

impl DeliveryRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transdermal => "transdermal",
            Self::Transmucosal => "transmucosal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transdermal" => Some(Self::Transdermal),
            "transmucosal" => Some(Self::Transmucosal),
            _ => None,
        }
    }

    pub fn all() -> &'static [DeliveryRoute] {
        &[Self::Transdermal, Self::Transmucosal]
    }
}

impl std::fmt::Display for DeliveryRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of external intelligence provider, tagged on every standardized
/// response so downstream components never branch on provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Search,
    Llm,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Llm => "llm",
        }
    }
}

/// Configured trust class of a cited source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Regulatory,
    PeerReviewed,
    ClinicalRegistry,
    Industry,
    Web,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regulatory => "regulatory",
            Self::PeerReviewed => "peer_reviewed",
            Self::ClinicalRegistry => "clinical_registry",
            Self::Industry => "industry",
            Self::Web => "web",
        }
    }
}

/// Outcome of validating one extracted table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    /// Cites a recognized, sufficiently authoritative source.
    Passed,
    /// No identifiable source.
    Failed,
    /// Cites a source, but unrecognized or low-authority.
    Flagged,
}

/// Why a merge conflict was resolved the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Winning source has higher configured authority.
    Authority,
    /// Authority tied; winning row had higher validation confidence.
    Confidence,
    /// Authority and confidence tied; winning response is more recent.
    Recency,
}

/// How a category's merged result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// Two or more validated sources merged by authority weighting.
    AuthorityWeighted,
    /// Exactly one validated source contributed.
    SingleSource,
    /// No source passed validation; best-effort merge, flagged low confidence.
    LowConfidenceFallback,
}

/// Verdict bands for a route feasibility score (fixed thresholds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Favorable,
    Moderate,
    Unfavorable,
}

impl Verdict {
    /// ≥7 favorable, 4–6 moderate, <4 unfavorable.
    pub fn from_score(score: f32) -> Self {
        if score >= 7.0 {
            Self::Favorable
        } else if score >= 4.0 {
            Self::Moderate
        } else {
            Self::Unfavorable
        }
    }
}

/// Final go/no-go decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Go,
    Conditional,
    NoGo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}
