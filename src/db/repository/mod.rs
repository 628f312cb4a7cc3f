//! Create/read repositories for pipeline records.
//!
//! Downstream records are append-only: there are no update or delete
//! functions for them. "Latest wins" reads order by `created_at` and keep
//! the newest record per key.

pub mod request;
pub mod provider_response;
pub mod source_validation;
pub mod category_validation;
pub mod merged;
pub mod score;
pub mod final_output;

pub use request::*;
pub use provider_response::*;
pub use source_validation::*;
pub use category_validation::*;
pub use merged::*;
pub use score::*;
pub use final_output::*;
