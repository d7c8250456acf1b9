//! Upstream capability interfaces
//!
//! The orchestrator only sees these traits. Concrete HTTP clients live in
//! `crate::clients`; tests substitute in-memory fakes.

use async_trait::async_trait;
use cpn_common::models::RawPuzzleResponse;
use cpn_common::{Difficulty, Puzzle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failure reported by an upstream capability
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Empty response: {0}")]
    Empty(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Curated puzzle API (Lichess)
#[async_trait]
pub trait PuzzleProvider: Send + Sync {
    /// Whether an API token is attached to authenticated calls
    fn has_auth_token(&self) -> bool;

    async fn daily_puzzle(&self) -> Result<RawPuzzleResponse, UpstreamError>;

    async fn puzzle_by_id(&self, id: &str) -> Result<RawPuzzleResponse, UpstreamError>;

    /// Next puzzle, optionally filtered by the provider's difficulty token
    async fn next_puzzle(
        &self,
        difficulty_token: Option<&str>,
    ) -> Result<RawPuzzleResponse, UpstreamError>;
}

/// Tabular puzzle dataset
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    async fn random_puzzle(&self, tier: Option<Difficulty>) -> Result<Puzzle, UpstreamError>;

    /// Up to `count` puzzles matching `tier`, in a stable order
    async fn candidate_puzzles(
        &self,
        tier: Option<Difficulty>,
        count: usize,
    ) -> Result<Vec<Puzzle>, UpstreamError>;
}

/// One chat message sent to a completion model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion endpoint
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Model used by [`CompletionProvider::complete`]
    fn default_model(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError>;

    /// Same as `complete` but against a specific model.
    ///
    /// Providers that cannot switch models ignore `model`.
    async fn complete_with_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let _ = model;
        self.complete(messages).await
    }
}

/// An optional upstream, checked at call time
pub enum Capability<T: ?Sized> {
    Configured(Arc<T>),
    Unconfigured,
}

impl<T: ?Sized> Capability<T> {
    pub fn from_option(handle: Option<Arc<T>>) -> Self {
        match handle {
            Some(handle) => Capability::Configured(handle),
            None => Capability::Unconfigured,
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Capability::Configured(handle) => Some(handle),
            Capability::Unconfigured => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Capability::Configured(_))
    }
}

impl Capability<dyn CompletionProvider> {
    /// Configured only when the client reports usable credentials
    pub fn completion(client: Arc<dyn CompletionProvider>) -> Self {
        if client.is_configured() {
            Capability::Configured(client)
        } else {
            Capability::Unconfigured
        }
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Configured(handle) => Capability::Configured(Arc::clone(handle)),
            Capability::Unconfigured => Capability::Unconfigured,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Configured(_) => f.write_str("Configured"),
            Capability::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}
