//! Retrieval orchestrator
//!
//! Six operations, each returning one canonical [`Puzzle`] or a
//! [`PuzzleError`]:
//! - [`PuzzleService::by_difficulty`]: Lichess next-puzzle with recency filtering
//! - [`PuzzleService::by_id`] / [`PuzzleService::daily`]: direct Lichess lookups
//! - [`PuzzleService::select_with_model`]: dataset candidates, model picks one
//! - [`PuzzleService::compose_with_model`]: model writes a puzzle from scratch
//! - [`PuzzleService::from_dataset`]: one random dataset row
//!
//! Lichess results are enriched from their game transcript before returning.

use super::capabilities::{Capability, ChatMessage, CompletionProvider, DatasetProvider, PuzzleProvider};
use super::error::{PuzzleError, PuzzleResult};
use super::generation::{self, Generated, GenerationTask, RetryPolicy, TransportPolicy};
use super::prompts;
use super::recency::RecencyTracker;
use super::schema::{self, SchemaError};
use super::selection::parse_selection;
use super::{cancellable, UpstreamError};
use cpn_common::models::RawPuzzleResponse;
use cpn_common::notation::reconstruct;
use cpn_common::{Difficulty, Puzzle, PuzzleSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Next-puzzle calls per by-difficulty request
pub const MAX_FETCH_ATTEMPTS: usize = 4;
/// Dataset candidates shown to the selection model
pub const CANDIDATE_COUNT: usize = 8;
/// Completion attempts per model in either pipeline
pub const MAX_MODEL_ATTEMPTS: usize = 2;
/// Shortest accepted generation prompt (after trimming)
pub const MIN_PROMPT_CHARS: usize = 8;

static PUZZLE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{5,8}$").expect("puzzle id pattern is valid"));

/// Body of the generation endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AiPuzzleRequest {
    pub prompt: String,
    pub difficulty: String,
}

impl AiPuzzleRequest {
    pub fn new(prompt: impl Into<String>, difficulty: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            difficulty: difficulty.into(),
        }
    }

    /// Trimmed prompt and parsed tier
    fn validate(&self) -> PuzzleResult<(String, Option<Difficulty>)> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(PuzzleError::Validation("prompt is required".to_string()));
        }
        if prompt.chars().count() < MIN_PROMPT_CHARS {
            return Err(PuzzleError::Validation(format!(
                "prompt must be at least {} characters",
                MIN_PROMPT_CHARS
            )));
        }
        let tier = parse_tier(&self.difficulty)?;
        Ok((prompt.to_string(), tier))
    }
}

/// Which optional upstreams are usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub lichess_token: bool,
    pub dataset: bool,
    pub completion: bool,
    pub fallback_models: usize,
}

fn parse_tier(raw: &str) -> PuzzleResult<Option<Difficulty>> {
    Difficulty::parse_optional(raw).map_err(|e| PuzzleError::Validation(e.to_string()))
}

/// Puzzle retrieval orchestrator
pub struct PuzzleService {
    lichess: Arc<dyn PuzzleProvider>,
    dataset: Capability<dyn DatasetProvider>,
    completion: Capability<dyn CompletionProvider>,
    fallback_models: Vec<String>,
    recency: RecencyTracker,
}

impl PuzzleService {
    pub fn new(lichess: Arc<dyn PuzzleProvider>, recency: RecencyTracker) -> Self {
        Self {
            lichess,
            dataset: Capability::Unconfigured,
            completion: Capability::Unconfigured,
            fallback_models: Vec::new(),
            recency,
        }
    }

    pub fn with_dataset(mut self, dataset: Capability<dyn DatasetProvider>) -> Self {
        self.dataset = dataset;
        self
    }

    /// Completion source plus models tried after its default, in order
    pub fn with_completion(
        mut self,
        completion: Capability<dyn CompletionProvider>,
        fallback_models: Vec<String>,
    ) -> Self {
        self.completion = completion;
        self.fallback_models = fallback_models;
        self
    }

    pub fn recency(&self) -> &RecencyTracker {
        &self.recency
    }

    pub fn capabilities(&self) -> CapabilityReport {
        CapabilityReport {
            lichess_token: self.lichess.has_auth_token(),
            dataset: self.dataset.is_configured(),
            completion: self.completion.is_configured(),
            fallback_models: self.fallback_models.len(),
        }
    }

    // ========================================
    // Lichess-backed operations
    // ========================================

    /// Fetch a puzzle for `difficulty`, avoiding recently served ids.
    ///
    /// Up to [`MAX_FETCH_ATTEMPTS`] calls. An empty id ends the loop early.
    /// When every attempt returns a recent puzzle the last one is served
    /// anyway.
    pub async fn by_difficulty(
        &self,
        difficulty: &str,
        cancel: &CancellationToken,
    ) -> PuzzleResult<Puzzle> {
        let tier = parse_tier(difficulty)?;
        let token = tier.map(Difficulty::lichess_token);

        let mut last: Option<RawPuzzleResponse> = None;
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            let raw = cancellable(cancel, self.lichess.next_puzzle(token))
                .await?
                .map_err(PuzzleError::upstream("lichess"))?;

            let id = raw.puzzle.id.clone();
            if id.is_empty() {
                debug!(attempt, "Lichess returned a puzzle without id, using it as-is");
                last = Some(raw);
                break;
            }

            if self.recency.remember_if_unseen(tier, &id) {
                debug!(puzzle_id = %id, attempt, "Fresh puzzle");
                return Ok(self.enrich(&raw));
            }

            debug!(puzzle_id = %id, attempt, "Puzzle served recently, retrying");
            last = Some(raw);
        }

        let raw = last.ok_or_else(|| PuzzleError::Upstream {
            service: "lichess",
            source: UpstreamError::Empty("no puzzle returned".to_string()),
        })?;
        if !raw.puzzle.id.is_empty() {
            warn!(
                puzzle_id = %raw.puzzle.id,
                tier = tier.map_or("any", Difficulty::as_str),
                "Serving a recently seen puzzle after {} attempts",
                MAX_FETCH_ATTEMPTS
            );
            self.recency.remember(tier, &raw.puzzle.id);
        }
        Ok(self.enrich(&raw))
    }

    pub async fn by_id(&self, id: &str, cancel: &CancellationToken) -> PuzzleResult<Puzzle> {
        let id = id.trim();
        if !PUZZLE_ID.is_match(id) {
            return Err(PuzzleError::Validation(format!(
                "invalid puzzle id {:?}: expected 5-8 letters or digits",
                id
            )));
        }

        let raw = cancellable(cancel, self.lichess.puzzle_by_id(id))
            .await?
            .map_err(PuzzleError::upstream("lichess"))?;
        Ok(self.enrich(&raw))
    }

    pub async fn daily(&self, cancel: &CancellationToken) -> PuzzleResult<Puzzle> {
        let raw = cancellable(cancel, self.lichess.daily_puzzle())
            .await?
            .map_err(PuzzleError::upstream("lichess"))?;
        Ok(self.enrich(&raw))
    }

    /// Canonical puzzle with position and setup move from the game transcript.
    ///
    /// An unusable transcript leaves the puzzle as converted.
    pub fn enrich(&self, raw: &RawPuzzleResponse) -> Puzzle {
        let mut puzzle = raw.to_canonical();
        if raw.game.pgn.trim().is_empty() {
            return puzzle;
        }

        let reconstruction = reconstruct(&raw.game.pgn, raw.puzzle.initial_ply as usize);
        debug!(
            puzzle_id = %puzzle.id,
            ply = raw.puzzle.initial_ply,
            strategy = ?reconstruction.strategy,
            "Transcript replayed"
        );
        if let Some(fen) = reconstruction.position {
            puzzle.fen = fen;
        }
        if let Some(setup) = reconstruction.setup_move {
            puzzle.moves.insert(0, setup);
        }
        puzzle
    }

    // ========================================
    // Dataset and model-backed operations
    // ========================================

    pub async fn from_dataset(
        &self,
        difficulty: &str,
        cancel: &CancellationToken,
    ) -> PuzzleResult<Puzzle> {
        let tier = parse_tier(difficulty)?;
        let dataset = self.require_dataset()?;

        cancellable(cancel, dataset.random_puzzle(tier))
            .await?
            .map_err(PuzzleError::upstream("dataset"))
    }

    /// Let the completion model choose among real dataset puzzles.
    ///
    /// Transport errors end the model loop at once; when no attempt yields
    /// a usable index the first candidate is returned, tagged as a fallback.
    pub async fn select_with_model(
        &self,
        request: &AiPuzzleRequest,
        cancel: &CancellationToken,
    ) -> PuzzleResult<Puzzle> {
        let completion = self.require_completion()?;
        let dataset = self.require_dataset()?;
        let (prompt, tier) = request.validate()?;

        let started = Instant::now();
        let candidates = cancellable(cancel, dataset.candidate_puzzles(tier, CANDIDATE_COUNT))
            .await?
            .map_err(PuzzleError::upstream("dataset"))?;
        if candidates.is_empty() {
            return Err(PuzzleError::Upstream {
                service: "dataset",
                source: UpstreamError::Empty("no candidate puzzles".to_string()),
            });
        }
        info!(
            candidates = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched selection candidates"
        );

        let task = SelectionTask {
            prompt: &prompt,
            tier,
            candidates: &candidates,
        };
        let policy = RetryPolicy {
            models: vec![None],
            attempts_per_model: MAX_MODEL_ATTEMPTS,
            on_transport_error: TransportPolicy::Abort,
        };

        match generation::run(&task, completion.as_ref(), &policy, cancel).await? {
            Generated::Done { value: index, .. } => {
                Ok(candidates[index].clone().with_source(PuzzleSource::AiSelection))
            }
            Generated::Exhausted { attempts, last_error } => {
                warn!(
                    attempts,
                    last_error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Selection failed, falling back to first candidate"
                );
                let first = candidates.into_iter().next().ok_or_else(|| PuzzleError::Upstream {
                    service: "dataset",
                    source: UpstreamError::Empty("no candidate puzzles".to_string()),
                })?;
                Ok(first.with_source(PuzzleSource::AiSelectionFallback))
            }
        }
    }

    /// Let completion models write a puzzle, trying fallback models in order.
    ///
    /// A transport error abandons the current model; a rejected output earns
    /// one corrective retry on the same model.
    pub async fn compose_with_model(
        &self,
        request: &AiPuzzleRequest,
        cancel: &CancellationToken,
    ) -> PuzzleResult<Puzzle> {
        let completion = self.require_completion()?;
        let (prompt, tier) = request.validate()?;

        let task = CompositionTask {
            prompt: &prompt,
            tier,
        };
        let models = std::iter::once(None)
            .chain(self.fallback_models.iter().cloned().map(Some))
            .collect();
        let policy = RetryPolicy {
            models,
            attempts_per_model: MAX_MODEL_ATTEMPTS,
            on_transport_error: TransportPolicy::NextModel,
        };

        match generation::run(&task, completion.as_ref(), &policy, cancel).await? {
            Generated::Done { value: mut puzzle, model, .. } => {
                if puzzle.id.is_empty() {
                    puzzle.id = synthesized_id();
                }
                puzzle.source = PuzzleSource::AiGenerated;
                info!(puzzle_id = %puzzle.id, model = %model, "Composed puzzle");
                Ok(puzzle)
            }
            Generated::Exhausted { attempts, last_error } => Err(PuzzleError::Exhausted {
                attempts,
                last_error: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no models configured".to_string()),
            }),
        }
    }

    fn require_dataset(&self) -> PuzzleResult<&Arc<dyn DatasetProvider>> {
        self.dataset
            .get()
            .ok_or_else(|| PuzzleError::Configuration("dataset source is not configured".to_string()))
    }

    fn require_completion(&self) -> PuzzleResult<&Arc<dyn CompletionProvider>> {
        self.completion.get().ok_or_else(|| {
            PuzzleError::Configuration("completion source is not configured".to_string())
        })
    }
}

/// `ai-` plus 8 hex characters
fn synthesized_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("ai-{}", &uuid[..8])
}

// ========================================
// Generation tasks
// ========================================

struct SelectionTask<'a> {
    prompt: &'a str,
    tier: Option<Difficulty>,
    candidates: &'a [Puzzle],
}

impl GenerationTask for SelectionTask<'_> {
    type Output = usize;

    fn name(&self) -> &'static str {
        "selection"
    }

    fn draft(&self) -> Vec<ChatMessage> {
        prompts::selection_messages(self.prompt, self.tier, self.candidates)
    }

    fn validate(&self, output: &str) -> Result<usize, SchemaError> {
        let selection = parse_selection(output, self.candidates.len());
        if selection.is_parsed() {
            Ok(selection.index)
        } else {
            Err(SchemaError::NoSelection)
        }
    }

    fn correction(&self, error: &SchemaError) -> String {
        prompts::selection_correction(&error.to_string())
    }
}

struct CompositionTask<'a> {
    prompt: &'a str,
    tier: Option<Difficulty>,
}

impl GenerationTask for CompositionTask<'_> {
    type Output = Puzzle;

    fn name(&self) -> &'static str {
        "composition"
    }

    fn draft(&self) -> Vec<ChatMessage> {
        prompts::generation_messages(self.prompt, self.tier)
    }

    fn validate(&self, output: &str) -> Result<Puzzle, SchemaError> {
        schema::validate_generated(output, self.tier)
    }

    fn correction(&self, error: &SchemaError) -> String {
        prompts::generation_correction(&error.to_string())
    }
}
