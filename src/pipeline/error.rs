use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request {id} is {status} and cannot be restarted")]
    Terminal { id: Uuid, status: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("{failed} of {total} categories failed, above the tolerated ratio")]
    FailureToleranceExceeded { failed: usize, total: usize },

    #[error("No rubric configured for route {0}")]
    MissingRubric(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
