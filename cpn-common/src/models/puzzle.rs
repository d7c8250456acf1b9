//! Canonical puzzle representation returned by the API

use super::Difficulty;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which upstream produced a puzzle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PuzzleSource {
    /// Lichess puzzle API (daily, by id, next)
    #[serde(rename = "lichess")]
    Lichess,
    /// Lichess puzzle dataset hosted on HuggingFace
    #[serde(rename = "huggingface-lichess")]
    Dataset,
    /// Dataset candidate chosen by a completion model
    #[serde(rename = "ai-rag")]
    AiSelection,
    /// Selection pipeline exhausted its attempts; first candidate returned
    #[serde(rename = "ai-rag-fallback")]
    AiSelectionFallback,
    /// Puzzle composed by a completion model
    #[serde(rename = "ai-generated")]
    AiGenerated,
}

impl PuzzleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PuzzleSource::Lichess => "lichess",
            PuzzleSource::Dataset => "huggingface-lichess",
            PuzzleSource::AiSelection => "ai-rag",
            PuzzleSource::AiSelectionFallback => "ai-rag-fallback",
            PuzzleSource::AiGenerated => "ai-generated",
        }
    }
}

impl fmt::Display for PuzzleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical puzzle
///
/// The first element of `moves` is the setup move played by the side that
/// does not solve the puzzle, when the upstream provided enough to know it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    /// FEN position (empty when no position is known)
    pub fen: String,
    /// Coordinate-notation moves (`e2e4`, `e7e8q`)
    pub moves: Vec<String>,
    /// Half-moves already played in the source game when the position was captured
    pub initial_ply: u32,
    pub rating: i32,
    pub rating_deviation: i32,
    pub popularity: i32,
    pub nb_plays: i32,
    pub themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_url: Option<String>,
    pub difficulty: Difficulty,
    pub source: PuzzleSource,
}

impl Puzzle {
    /// Same puzzle with a different source tag
    pub fn with_source(mut self, source: PuzzleSource) -> Self {
        self.source = source;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Puzzle {
        Puzzle {
            id: "abc12".to_string(),
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            moves: vec!["a1a2".to_string(), "h1h2".to_string()],
            initial_ply: 12,
            rating: 1450,
            rating_deviation: 80,
            popularity: 90,
            nb_plays: 1000,
            themes: vec!["endgame".to_string()],
            game_url: None,
            difficulty: Difficulty::Medium,
            source: PuzzleSource::Lichess,
        }
    }

    #[test]
    fn test_json_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["initialPly"], 12);
        assert_eq!(value["ratingDeviation"], 80);
        assert_eq!(value["nbPlays"], 1000);
        assert_eq!(value["difficulty"], "medium");
        assert_eq!(value["source"], "lichess");
        assert!(value.get("gameUrl").is_none());
    }

    #[test]
    fn test_source_tags() {
        let value = serde_json::to_value(PuzzleSource::AiSelectionFallback).unwrap();
        assert_eq!(value, "ai-rag-fallback");
        assert_eq!(PuzzleSource::Dataset.to_string(), "huggingface-lichess");
    }
}
