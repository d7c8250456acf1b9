//! Raw Lichess puzzle API response shape

use super::{Difficulty, Puzzle, PuzzleSource};
use serde::{Deserialize, Serialize};

const LICHESS_GAME_URL: &str = "https://lichess.org/";

/// Response body of `/api/puzzle/{daily,next,<id>}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPuzzleResponse {
    #[serde(default)]
    pub puzzle: RawPuzzle,
    #[serde(default)]
    pub game: RawGame,
}

/// Puzzle half of the response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPuzzle {
    pub id: String,
    /// Half-moves played before the setup move
    pub initial_ply: u32,
    /// Solution moves; excludes the opponent's setup move
    pub solution: Vec<String>,
    pub themes: Vec<String>,
    pub rating: i32,
    pub rating_deviation: i32,
    pub popularity: i32,
    pub nb_plays: i32,
}

/// Game half of the response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawGame {
    pub id: String,
    /// Compressed movetext of the source game
    pub pgn: String,
    pub clock: String,
    pub rated: bool,
}

impl RawPuzzleResponse {
    /// Convert into the canonical model.
    ///
    /// The position stays empty; it is filled in by transcript enrichment.
    pub fn to_canonical(&self) -> Puzzle {
        let game_url = if self.game.id.is_empty() {
            None
        } else {
            Some(format!("{}{}", LICHESS_GAME_URL, self.game.id))
        };

        Puzzle {
            id: self.puzzle.id.clone(),
            fen: String::new(),
            moves: self.puzzle.solution.clone(),
            initial_ply: self.puzzle.initial_ply,
            rating: self.puzzle.rating,
            rating_deviation: self.puzzle.rating_deviation,
            popularity: self.puzzle.popularity,
            nb_plays: self.puzzle.nb_plays,
            themes: self.puzzle.themes.clone(),
            game_url,
            difficulty: Difficulty::from_rating(self.puzzle.rating),
            source: PuzzleSource::Lichess,
        }
    }
}
