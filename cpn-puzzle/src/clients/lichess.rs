//! Lichess puzzle API client
//!
//! Endpoints:
//! - `GET /api/puzzle/daily`
//! - `GET /api/puzzle/{id}`
//! - `GET /api/puzzle/next?difficulty=<token>`
//!
//! The bearer token (if any) is sent with daily and by-id requests only.
//! Authenticated next-puzzle requests keep returning the same unsolved
//! puzzle, so those stay anonymous.

use super::{body_excerpt, USER_AGENT};
use crate::config::LichessConfig;
use crate::services::{PuzzleProvider, UpstreamError};
use async_trait::async_trait;
use cpn_common::models::RawPuzzleResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub struct LichessClient {
    http_client: Client,
    base_url: String,
    api_token: Option<String>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl LichessClient {
    pub fn new(config: &LichessConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    async fn fetch(
        &self,
        path: &str,
        query: &[(&str, &str)],
        with_auth: bool,
    ) -> Result<RawPuzzleResponse, UpstreamError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, with_auth, "Querying Lichess");

        let mut request = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(query);
        if with_auth {
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(format!("lichess {}", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api(status.as_u16(), body_excerpt(&body)));
        }

        response
            .json::<RawPuzzleResponse>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PuzzleProvider for LichessClient {
    fn has_auth_token(&self) -> bool {
        self.api_token.is_some()
    }

    async fn daily_puzzle(&self) -> Result<RawPuzzleResponse, UpstreamError> {
        self.fetch("/api/puzzle/daily", &[], true).await
    }

    async fn puzzle_by_id(&self, id: &str) -> Result<RawPuzzleResponse, UpstreamError> {
        self.fetch(&format!("/api/puzzle/{}", id), &[], true).await
    }

    async fn next_puzzle(
        &self,
        difficulty_token: Option<&str>,
    ) -> Result<RawPuzzleResponse, UpstreamError> {
        match difficulty_token {
            Some(token) => {
                self.fetch("/api/puzzle/next", &[("difficulty", token)], false)
                    .await
            }
            None => self.fetch("/api/puzzle/next", &[], false).await,
        }
    }
}
