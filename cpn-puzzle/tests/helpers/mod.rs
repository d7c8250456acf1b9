//! In-memory upstream fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cpn_common::models::{RawGame, RawPuzzle, RawPuzzleResponse};
use cpn_common::{Difficulty, Puzzle, PuzzleSource};
use cpn_puzzle::services::{
    Capability, ChatMessage, CompletionProvider, DatasetProvider, PuzzleProvider, PuzzleService,
    RecencyTracker, UpstreamError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const RUY_LOPEZ: &str = "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6";

pub fn raw_puzzle(id: &str, rating: i32) -> RawPuzzleResponse {
    RawPuzzleResponse {
        puzzle: RawPuzzle {
            id: id.to_string(),
            initial_ply: 4,
            solution: vec!["a7a6".to_string(), "b5a4".to_string()],
            themes: vec!["opening".to_string()],
            rating,
            rating_deviation: 75,
            popularity: 90,
            nb_plays: 500,
        },
        game: RawGame {
            id: "g4m3Id00".to_string(),
            pgn: RUY_LOPEZ.to_string(),
            clock: "5+0".to_string(),
            rated: true,
        },
    }
}

pub fn dataset_puzzle(id: &str, rating: i32) -> Puzzle {
    Puzzle {
        id: id.to_string(),
        fen: "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1".to_string(),
        moves: vec!["d1d8".to_string(), "g8h8".to_string()],
        initial_ply: 0,
        rating,
        rating_deviation: 80,
        popularity: 95,
        nb_plays: 1200,
        themes: vec!["backRankMate".to_string(), "mateIn1".to_string()],
        game_url: None,
        difficulty: Difficulty::from_rating(rating),
        source: PuzzleSource::Dataset,
    }
}

/// Lichess stand-in: `next_puzzle` replays a script, repeating its last entry
pub struct FakeLichess {
    script: Mutex<VecDeque<RawPuzzleResponse>>,
    last: Mutex<Option<RawPuzzleResponse>>,
    pub next_calls: AtomicUsize,
    pub tokens: Mutex<Vec<Option<String>>>,
}

impl FakeLichess {
    pub fn new(script: Vec<RawPuzzleResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            next_calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(raw: RawPuzzleResponse) -> Self {
        Self::new(vec![raw])
    }

    pub fn calls(&self) -> usize {
        self.next_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PuzzleProvider for FakeLichess {
    fn has_auth_token(&self) -> bool {
        false
    }

    async fn daily_puzzle(&self) -> Result<RawPuzzleResponse, UpstreamError> {
        Ok(raw_puzzle("daily01", 1500))
    }

    async fn puzzle_by_id(&self, id: &str) -> Result<RawPuzzleResponse, UpstreamError> {
        if id == "missing" || id == "zzzzz" {
            return Err(UpstreamError::NotFound(format!("lichess /api/puzzle/{}", id)));
        }
        Ok(raw_puzzle(id, 1500))
    }

    async fn next_puzzle(
        &self,
        difficulty_token: Option<&str>,
    ) -> Result<RawPuzzleResponse, UpstreamError> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .push(difficulty_token.map(str::to_string));

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .ok_or_else(|| UpstreamError::Empty("script is empty".to_string()))
    }
}

/// Dataset stand-in returning a fixed candidate list
pub struct FakeDataset {
    pub puzzles: Vec<Puzzle>,
}

#[async_trait]
impl DatasetProvider for FakeDataset {
    async fn random_puzzle(&self, tier: Option<Difficulty>) -> Result<Puzzle, UpstreamError> {
        self.puzzles
            .iter()
            .find(|p| tier.map_or(true, |t| p.difficulty == t))
            .cloned()
            .ok_or_else(|| UpstreamError::Empty("no matching row".to_string()))
    }

    async fn candidate_puzzles(
        &self,
        tier: Option<Difficulty>,
        count: usize,
    ) -> Result<Vec<Puzzle>, UpstreamError> {
        let found: Vec<Puzzle> = self
            .puzzles
            .iter()
            .filter(|p| tier.map_or(true, |t| p.difficulty == t))
            .take(count)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(UpstreamError::Empty("no candidates".to_string()));
        }
        Ok(found)
    }
}

/// Completion stand-in replaying scripted replies; records (model, message count)
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    /// Reply used once the script runs out
    repeat: Option<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<&str, UpstreamError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn is_configured(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        "primary"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        self.complete_with_model("primary", messages).await
    }

    async fn complete_with_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        self.calls.lock().unwrap().push((model.to_string(), messages.len()));
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| UpstreamError::Empty("script ran out".to_string())),
        }
    }
}

pub fn service_with(
    lichess: Arc<FakeLichess>,
    dataset: Option<Arc<FakeDataset>>,
    completion: Option<Arc<ScriptedCompletion>>,
    fallback_models: Vec<String>,
) -> PuzzleService {
    let dataset: Option<Arc<dyn DatasetProvider>> = dataset.map(|d| d as Arc<dyn DatasetProvider>);
    let completion: Option<Arc<dyn CompletionProvider>> =
        completion.map(|c| c as Arc<dyn CompletionProvider>);

    PuzzleService::new(lichess, RecencyTracker::default())
        .with_dataset(Capability::from_option(dataset))
        .with_completion(Capability::from_option(completion), fallback_models)
}

pub const VALID_GENERATED: &str = r#"Here you go:
```json
{
  "fen": "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
  "moves": ["d1d8", "g8h8"],
  "rating": 1100,
  "themes": ["backRankMate"],
  "difficulty": "easy"
}
```"#;
