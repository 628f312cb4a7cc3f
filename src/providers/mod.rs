//! External intelligence providers.
//!
//! The gateway is the only component that talks to the outside world: it
//! owns rate limiting, deadlines, retry and usage accounting, and hands the
//! rest of the pipeline provider answers normalized into one fixed shape.

pub mod client;
pub mod gateway;

pub use client::{HttpProvider, IntelligenceProvider, MockProvider, ProviderReply};
pub use gateway::{ProviderGateway, ProviderUsage};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {0} is not registered")]
    UnknownProvider(String),

    #[error("Provider {0} is disabled")]
    Disabled(String),

    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Call to {provider} timed out")]
    Timeout { provider: String },

    #[error("Provider {provider} rate limited the call")]
    RateLimited { provider: String },

    #[error("Provider {provider} returned HTTP {status}")]
    Http { provider: String, status: u16 },

    #[error("Cannot reach provider {provider}: {message}")]
    Connect { provider: String, message: String },

    #[error("Provider {provider} rejected credentials")]
    Auth { provider: String },

    #[error("Malformed provider answer: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transient failures are worth retrying with backoff; permanent ones
    /// fail the call immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout { .. }
            | ProviderError::RateLimited { .. }
            | ProviderError::Connect { .. } => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout { provider: "p".into() }.is_transient());
        assert!(ProviderError::RateLimited { provider: "p".into() }.is_transient());
        assert!(ProviderError::Http { provider: "p".into(), status: 503 }.is_transient());
        assert!(ProviderError::Http { provider: "p".into(), status: 429 }.is_transient());

        assert!(!ProviderError::Http { provider: "p".into(), status: 404 }.is_transient());
        assert!(!ProviderError::Auth { provider: "p".into() }.is_transient());
        assert!(!ProviderError::EmptyPrompt.is_transient());
        assert!(!ProviderError::Malformed("bad json".into()).is_transient());
    }
}
