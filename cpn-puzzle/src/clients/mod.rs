//! HTTP clients for the upstream capabilities

pub mod completion;
pub mod dataset;
pub mod lichess;

pub use completion::ChatCompletionClient;
pub use dataset::HuggingFaceClient;
pub use lichess::LichessClient;

pub(crate) const USER_AGENT: &str = concat!("cpn-puzzle/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an upstream error body kept in an error message
const BODY_EXCERPT_CHARS: usize = 200;

pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
