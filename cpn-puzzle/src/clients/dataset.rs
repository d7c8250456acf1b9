//! HuggingFace datasets-server client for the Lichess puzzle dataset
//!
//! Uses two endpoints:
//! - `GET /size?dataset=...` for the split's row count
//! - `GET /rows?dataset=...&config=...&split=...&offset=...&length=...`
//!
//! Rows missing an id, FEN or moves are skipped.

use super::{body_excerpt, USER_AGENT};
use crate::config::DatasetConfig;
use crate::services::{DatasetProvider, UpstreamError};
use async_trait::async_trait;
use cpn_common::{Difficulty, Puzzle, PuzzleSource};
use rand::Rng;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Single-row reads per random pick when a tier is requested
const RANDOM_PICK_ATTEMPTS: usize = 20;
/// Largest batch read for candidates
const MAX_BATCH_ROWS: usize = 100;

#[derive(Debug, Deserialize)]
struct SizeResponse {
    size: DatasetSize,
}

#[derive(Debug, Deserialize)]
struct DatasetSize {
    #[serde(default)]
    splits: Vec<SplitSize>,
}

#[derive(Debug, Deserialize)]
struct SplitSize {
    split: String,
    num_rows: usize,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    #[serde(default)]
    rows: Vec<RowEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: Map<String, Value>,
}

pub struct HuggingFaceClient {
    http_client: Client,
    base_url: String,
    dataset: String,
    config: String,
    split: String,
}

impl HuggingFaceClient {
    pub fn new(config: &DatasetConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dataset: config.dataset.clone(),
            config: config.config.clone(),
            split: config.split.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api(status.as_u16(), body_excerpt(&body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn row_count(&self) -> Result<usize, UpstreamError> {
        let size: SizeResponse = self
            .get_json("/size", &[("dataset", self.dataset.clone())])
            .await?;

        let rows = size
            .size
            .splits
            .into_iter()
            .find(|s| s.split == self.split)
            .map(|s| s.num_rows)
            .ok_or_else(|| UpstreamError::NotFound(format!("split {:?}", self.split)))?;

        if rows == 0 {
            return Err(UpstreamError::Empty(format!("split {:?} has no rows", self.split)));
        }
        Ok(rows)
    }

    async fn rows(&self, offset: usize, length: usize) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        debug!(offset, length, dataset = %self.dataset, "Reading dataset rows");
        let response: RowsResponse = self
            .get_json(
                "/rows",
                &[
                    ("dataset", self.dataset.clone()),
                    ("config", self.config.clone()),
                    ("split", self.split.clone()),
                    ("offset", offset.to_string()),
                    ("length", length.to_string()),
                ],
            )
            .await?;
        Ok(response.rows.into_iter().map(|r| r.row).collect())
    }
}

#[async_trait]
impl DatasetProvider for HuggingFaceClient {
    async fn random_puzzle(&self, tier: Option<Difficulty>) -> Result<Puzzle, UpstreamError> {
        let total = self.row_count().await?;
        let attempts = if tier.is_some() { RANDOM_PICK_ATTEMPTS } else { 1 };

        for _ in 0..attempts {
            let offset = rand::thread_rng().gen_range(0..total);
            let rows = self.rows(offset, 1).await?;
            let Some(row) = rows.first() else {
                return Err(UpstreamError::Empty("rows response".to_string()));
            };
            if let Some(puzzle) = row_to_puzzle(row) {
                if tier.map_or(true, |t| puzzle.difficulty == t) {
                    return Ok(puzzle);
                }
            }
        }

        Err(UpstreamError::Empty(match tier {
            Some(t) => format!("no {} puzzle found after {} reads", t, attempts),
            None => "no valid puzzle row found".to_string(),
        }))
    }

    async fn candidate_puzzles(
        &self,
        tier: Option<Difficulty>,
        count: usize,
    ) -> Result<Vec<Puzzle>, UpstreamError> {
        let total = self.row_count().await?;
        let batch = (count * 10).clamp(1, MAX_BATCH_ROWS);
        let max_offset = total.saturating_sub(batch).max(1);
        let offset = rand::thread_rng().gen_range(0..max_offset);

        let puzzles: Vec<Puzzle> = self
            .rows(offset, batch)
            .await?
            .iter()
            .filter_map(row_to_puzzle)
            .filter(|p| tier.map_or(true, |t| p.difficulty == t))
            .take(count)
            .collect();

        if puzzles.is_empty() {
            return Err(UpstreamError::Empty(format!(
                "no candidate puzzles for {}",
                tier.map_or("any", Difficulty::as_str)
            )));
        }
        Ok(puzzles)
    }
}

/// Map one dataset row to a canonical puzzle
fn row_to_puzzle(row: &Map<String, Value>) -> Option<Puzzle> {
    let id = as_string(row.get("PuzzleId"));
    let fen = as_string(row.get("FEN"));
    let moves: Vec<String> = as_string(row.get("Moves"))
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if id.is_empty() || fen.is_empty() || moves.is_empty() {
        return None;
    }

    let rating = as_int(row.get("Rating"));
    let game_url = as_string(row.get("GameUrl"));

    Some(Puzzle {
        id,
        fen,
        moves,
        initial_ply: 0,
        rating,
        rating_deviation: as_int(row.get("RatingDeviation")),
        popularity: as_int(row.get("Popularity")),
        nb_plays: as_int(row.get("NbPlays")),
        themes: parse_themes(row.get("Themes")),
        game_url: (!game_url.is_empty()).then_some(game_url),
        difficulty: Difficulty::from_rating(rating),
        source: PuzzleSource::Dataset,
    })
}

fn as_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn as_int(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Themes arrive space separated, sometimes as a stringified list
fn parse_themes(value: Option<&Value>) -> Vec<String> {
    let raw = match value {
        Some(Value::Array(items)) => {
            return items
                .iter()
                .map(|v| as_string(Some(v)))
                .filter(|s| !s.is_empty())
                .collect()
        }
        other => as_string(other),
    };

    raw.split(|c: char| c.is_whitespace() || c == ',')
        .map(|part| part.trim_matches(|c| matches!(c, '[' | ']' | '\'' | '"')))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
