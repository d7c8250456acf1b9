//! Puzzle endpoints
//!
//! - `GET  /puzzle?difficulty=`          Lichess next puzzle (empty → medium)
//! - `GET  /puzzle/daily`                Lichess daily puzzle
//! - `GET  /puzzle/dataset?difficulty=`  random dataset row (empty → any tier)
//! - `GET  /puzzle/:id`                  Lichess puzzle by id
//! - `POST /puzzle/ai`                   model picks among dataset candidates
//! - `POST /puzzle/generate`             model composes a puzzle

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use cpn_common::{Difficulty, Puzzle};
use serde::Deserialize;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::services::{AiPuzzleRequest, PuzzleResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DifficultyQuery {
    #[serde(default)]
    pub difficulty: String,
}

fn or_medium(difficulty: &str) -> String {
    if difficulty.trim().is_empty() {
        Difficulty::Medium.as_str().to_string()
    } else {
        difficulty.to_string()
    }
}

/// Convert a service result, remembering server-side failures for /health
async fn respond(state: &AppState, result: PuzzleResult<Puzzle>) -> ApiResult<Json<Puzzle>> {
    match result {
        Ok(puzzle) => Ok(Json(puzzle)),
        Err(e) => {
            let err = ApiError::from(e);
            if err.status().is_server_error() {
                warn!(error = %err, "Puzzle request failed");
                state.record_error(err.to_string()).await;
            }
            Err(err)
        }
    }
}

/// GET /puzzle
pub async fn get_puzzle(
    State(state): State<AppState>,
    Query(query): Query<DifficultyQuery>,
) -> ApiResult<Json<Puzzle>> {
    let cancel = state.request_token();
    let result = state
        .service
        .by_difficulty(&or_medium(&query.difficulty), &cancel)
        .await;
    respond(&state, result).await
}

/// GET /puzzle/daily
pub async fn get_daily(State(state): State<AppState>) -> ApiResult<Json<Puzzle>> {
    let cancel = state.request_token();
    let result = state.service.daily(&cancel).await;
    respond(&state, result).await
}

/// GET /puzzle/dataset
pub async fn get_dataset_puzzle(
    State(state): State<AppState>,
    Query(query): Query<DifficultyQuery>,
) -> ApiResult<Json<Puzzle>> {
    let cancel = state.request_token();
    let result = state.service.from_dataset(&query.difficulty, &cancel).await;
    respond(&state, result).await
}

/// GET /puzzle/:id
pub async fn get_puzzle_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Puzzle>> {
    let cancel = state.request_token();
    let result = state.service.by_id(&id, &cancel).await;
    respond(&state, result).await
}

fn ai_request(payload: Result<Json<AiPuzzleRequest>, JsonRejection>) -> ApiResult<AiPuzzleRequest> {
    let Json(mut request) = payload?;
    request.difficulty = or_medium(&request.difficulty);
    Ok(request)
}

/// POST /puzzle/ai
pub async fn post_ai_puzzle(
    State(state): State<AppState>,
    payload: Result<Json<AiPuzzleRequest>, JsonRejection>,
) -> ApiResult<Json<Puzzle>> {
    let request = ai_request(payload)?;
    let cancel = state.request_token();
    let result = state.service.select_with_model(&request, &cancel).await;
    respond(&state, result).await
}

/// POST /puzzle/generate
pub async fn post_generated_puzzle(
    State(state): State<AppState>,
    payload: Result<Json<AiPuzzleRequest>, JsonRejection>,
) -> ApiResult<Json<Puzzle>> {
    let request = ai_request(payload)?;
    let cancel = state.request_token();
    let result = state.service.compose_with_model(&request, &cancel).await;
    respond(&state, result).await
}

/// Build puzzle routes
pub fn puzzle_routes() -> Router<AppState> {
    Router::new()
        .route("/puzzle", get(get_puzzle))
        .route("/puzzle/daily", get(get_daily))
        .route("/puzzle/dataset", get(get_dataset_puzzle))
        .route("/puzzle/ai", post(post_ai_puzzle))
        .route("/puzzle/generate", post(post_generated_puzzle))
        .route("/puzzle/:id", get(get_puzzle_by_id))
}
