//! Orchestrator error taxonomy

use super::capabilities::UpstreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PuzzleError {
    /// Bad caller input; never retried
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A required upstream is not configured
    #[error("Not configured: {0}")]
    Configuration(String),

    #[error("{service} request failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// Every model and attempt failed; schema failures surface here
    #[error("Generation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl PuzzleError {
    pub fn upstream(service: &'static str) -> impl FnOnce(UpstreamError) -> Self {
        move |source| PuzzleError::Upstream { service, source }
    }
}

pub type PuzzleResult<T> = Result<T, PuzzleError>;
