use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DeliveryRoute, RequestStatus};
use super::now_ts;

/// An assessment request: one drug, a set of categories to investigate, and
/// the delivery routes to score. Owns the pipeline lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub id: Uuid,
    pub drug_name: String,
    /// Category ids from the configuration snapshot, in execution order.
    pub categories: Vec<String>,
    pub routes: Vec<DeliveryRoute>,
    pub status: RequestStatus,
    /// Overall progress in [0, 100].
    pub progress: f32,
    /// Populated when the request reaches `failed`.
    pub error_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssessmentRequest {
    pub fn new(drug_name: &str, categories: Vec<String>, routes: Vec<DeliveryRoute>) -> Self {
        let ts = now_ts();
        Self {
            id: Uuid::new_v4(),
            drug_name: drug_name.trim().to_string(),
            categories,
            routes,
            status: RequestStatus::Submitted,
            progress: 0.0,
            error_reason: None,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }
}
