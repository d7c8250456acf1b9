//! Puzzle retrieval services
//!
//! [`PuzzleService`] coordinates the upstream capabilities, the recency
//! tracker, transcript enrichment and the two generation pipelines.

pub mod capabilities;
pub mod error;
pub mod generation;
pub mod prompts;
pub mod puzzle_service;
pub mod recency;
pub mod schema;
pub mod selection;

pub use capabilities::{
    Capability, ChatMessage, CompletionProvider, DatasetProvider, PuzzleProvider, Role,
    UpstreamError,
};
pub use error::{PuzzleError, PuzzleResult};
pub use puzzle_service::{AiPuzzleRequest, CapabilityReport, PuzzleService};
pub use recency::RecencyTracker;
pub use schema::SchemaError;

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Longest slice of model output copied into a log line
const LOG_OUTPUT_CHARS: usize = 200;

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> PuzzleResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PuzzleError::Cancelled),
        out = fut => Ok(out),
    }
}

pub(crate) fn truncate_for_log(text: &str) -> &str {
    match text.char_indices().nth(LOG_OUTPUT_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
