//! Structural validation of model-generated puzzles
//!
//! Model output is untrusted text. [`extract_json_object`] pulls the first
//! balanced `{...}` out of it and [`validate_generated`] decodes and checks
//! it, repairing the fields that have a safe default and rejecting the ones
//! that do not. Every rejection is a distinct [`SchemaError`] so the caller
//! can tell the model exactly what to fix.

use cpn_common::{Difficulty, Puzzle, PuzzleSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Rating assigned when the model gives none (or a non-positive one)
pub const DEFAULT_RATING: i32 = 1600;
/// Rating deviation assigned when the model gives none
pub const DEFAULT_RATING_DEVIATION: i32 = 100;
/// Theme used when the model lists no themes
pub const DEFAULT_THEME: &str = "tactics";
/// Fewest moves a generated puzzle may have
pub const MIN_MOVES: usize = 2;

static MOVE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-h][1-8][a-h][1-8][qrbn]?$").expect("move pattern is valid")
});

/// Structural validation failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no JSON object found in output")]
    MissingObject,

    #[error("JSON object could not be decoded: {0}")]
    Undecodable(String),

    #[error("fen is missing or empty")]
    MissingPosition,

    #[error("fen field {field} is invalid: {reason}")]
    BadPosition { field: usize, reason: String },

    #[error("moves must contain at least 2 entries, got {0}")]
    TooFewMoves(usize),

    #[error("moves[{index}] = {token:?} is not a coordinate move like e2e4 or e7e8q")]
    BadMove { index: usize, token: String },

    #[error("no selected_index found in output")]
    NoSelection,
}

/// Extract the first balanced JSON object from free-form text.
///
/// A single surrounding code fence (with optional language tag) is removed
/// first. Returns `None` when no `{` is present or braces never balance.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        text = rest.trim().strip_suffix("```").unwrap_or(rest).trim();
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Check the six FEN fields structurally (no legality check)
pub fn validate_fen(fen: &str) -> Result<(), SchemaError> {
    let fen = fen.trim();
    if fen.is_empty() {
        return Err(SchemaError::MissingPosition);
    }

    let bad = |field: usize, reason: String| SchemaError::BadPosition { field, reason };

    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(bad(0, format!("expected 6 fields, got {}", fields.len())));
    }

    let ranks: Vec<&str> = fields[0].split('/').collect();
    if ranks.len() != 8 {
        return Err(bad(1, format!("expected 8 ranks, got {}", ranks.len())));
    }
    for (i, rank) in ranks.iter().enumerate() {
        let mut squares = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => squares += c.to_digit(10).unwrap_or(0),
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => {
                    squares += 1
                }
                other => return Err(bad(1, format!("rank {} has unknown piece {:?}", i + 1, other))),
            }
        }
        if squares != 8 {
            return Err(bad(1, format!("rank {} covers {} squares", i + 1, squares)));
        }
    }

    if fields[1] != "w" && fields[1] != "b" {
        return Err(bad(2, format!("side to move {:?}", fields[1])));
    }

    let castling = fields[2];
    if castling != "-" && !castling.chars().all(|c| matches!(c, 'K' | 'Q' | 'k' | 'q')) {
        return Err(bad(3, format!("castling rights {:?}", castling)));
    }

    let ep = fields[3];
    let ep_ok = ep == "-"
        || matches!(ep.as_bytes(), [file, rank] if (b'a'..=b'h').contains(file) && (*rank == b'3' || *rank == b'6'));
    if !ep_ok {
        return Err(bad(4, format!("en passant square {:?}", ep)));
    }

    for (index, value) in [(5, fields[4]), (6, fields[5])] {
        if value.parse::<u32>().is_err() {
            return Err(bad(index, format!("{:?} is not a non-negative integer", value)));
        }
    }

    Ok(())
}

/// Validate one move token; returns it lowercased
pub fn validate_move(index: usize, token: &str) -> Result<String, SchemaError> {
    let trimmed = token.trim();
    if MOVE_PATTERN.is_match(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(SchemaError::BadMove {
            index,
            token: token.to_string(),
        })
    }
}

/// Shape the model is asked to produce
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GeneratedPuzzle {
    id: String,
    fen: String,
    moves: Vec<String>,
    rating: f64,
    rating_deviation: f64,
    themes: Vec<String>,
    difficulty: String,
}

/// Decode and validate a model response as a puzzle.
///
/// Repairs applied silently:
/// - blank themes dropped, empty list becomes [`DEFAULT_THEME`]
/// - non-positive rating / deviation replaced with the defaults
/// - an unrecognised difficulty becomes `requested` (or medium)
///
/// The returned puzzle is tagged `ai-generated`; `id` may be empty.
pub fn validate_generated(
    output: &str,
    requested: Option<Difficulty>,
) -> Result<Puzzle, SchemaError> {
    let payload = extract_json_object(output).ok_or(SchemaError::MissingObject)?;
    let draft: GeneratedPuzzle =
        serde_json::from_str(payload).map_err(|e| SchemaError::Undecodable(e.to_string()))?;

    validate_fen(&draft.fen)?;

    if draft.moves.len() < MIN_MOVES {
        return Err(SchemaError::TooFewMoves(draft.moves.len()));
    }
    let moves = draft
        .moves
        .iter()
        .enumerate()
        .map(|(i, m)| validate_move(i, m))
        .collect::<Result<Vec<_>, _>>()?;

    let mut themes: Vec<String> = draft
        .themes
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if themes.is_empty() {
        themes.push(DEFAULT_THEME.to_string());
    }

    let rating = positive_or(draft.rating, DEFAULT_RATING);
    let rating_deviation = positive_or(draft.rating_deviation, DEFAULT_RATING_DEVIATION);

    let difficulty = draft
        .difficulty
        .parse::<Difficulty>()
        .unwrap_or_else(|_| requested.unwrap_or(Difficulty::Medium));

    Ok(Puzzle {
        id: draft.id.trim().to_string(),
        fen: draft.fen.split_whitespace().collect::<Vec<_>>().join(" "),
        moves,
        initial_ply: 0,
        rating,
        rating_deviation,
        popularity: 0,
        nb_plays: 0,
        themes,
        game_url: None,
        difficulty,
        source: PuzzleSource::AiGenerated,
    })
}

fn positive_or(value: f64, default: i32) -> i32 {
    if value.is_finite() && value >= 1.0 {
        value.round().min(i32::MAX as f64) as i32
    } else {
        default
    }
}
