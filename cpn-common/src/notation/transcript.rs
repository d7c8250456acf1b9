//! Transcript replay
//!
//! [`reconstruct`] turns a game transcript plus a ply offset into the
//! position at that ply and the move played from it (the puzzle's setup
//! move). A strict replay of the whole transcript is tried first. If any
//! token in it fails, a permissive replay of just the prefix up to the ply
//! recovers the position alone.

use super::board::{Board, STARTING_FEN};
use super::san::{self, Dialect};
use super::NotationError;
use tracing::debug;

/// Which replay produced a [`Reconstruction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Nothing to replay (empty or header-only transcript)
    Empty,
    /// Full strict replay succeeded
    Primary,
    /// Permissive prefix replay; never yields a setup move
    Fallback,
}

/// Result of replaying a transcript to a ply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// FEN of the position at the requested ply (or the last reachable one)
    pub position: Option<String>,
    /// Move played at the requested ply, in coordinate form (`e2e4`, `e7e8q`)
    pub setup_move: Option<String>,
    pub strategy: Strategy,
}

impl Reconstruction {
    fn empty() -> Self {
        Self {
            position: None,
            setup_move: None,
            strategy: Strategy::Empty,
        }
    }
}

/// Replay `transcript` and report the position at `ply`.
///
/// Never fails: an unusable transcript produces an empty reconstruction,
/// which callers treat as "no enrichment available".
pub fn reconstruct(transcript: &str, ply: usize) -> Reconstruction {
    let parsed = Transcript::parse(transcript);
    if parsed.moves.is_empty() {
        return Reconstruction::empty();
    }

    match replay_strict(&parsed, ply) {
        Ok(reconstruction) => reconstruction,
        Err(e) => {
            debug!(error = %e, ply, "Strict transcript replay failed, trying permissive prefix");
            replay_prefix(transcript, parsed.start_fen.as_deref(), ply)
        }
    }
}

fn replay_strict(parsed: &Transcript, ply: usize) -> Result<Reconstruction, NotationError> {
    let mut board = start_board(parsed.start_fen.as_deref())?;
    let mut positions = vec![board.to_fen()];
    let mut moves = Vec::with_capacity(parsed.moves.len());

    for token in &parsed.moves {
        let mv = san::play(&mut board, token, Dialect::Strict)?;
        moves.push(mv.to_string());
        positions.push(board.to_fen());
    }

    let index = ply.min(positions.len() - 1);
    Ok(Reconstruction {
        position: positions.into_iter().nth(index),
        setup_move: moves.into_iter().nth(ply),
        strategy: Strategy::Primary,
    })
}

fn replay_prefix(transcript: &str, start_fen: Option<&str>, ply: usize) -> Reconstruction {
    let tokens = loose_tokens(transcript);
    if tokens.is_empty() {
        return Reconstruction::empty();
    }
    let Ok(mut board) = start_board(start_fen) else {
        return Reconstruction::empty();
    };

    for (i, token) in tokens.iter().take(ply).enumerate() {
        if let Err(e) = san::play(&mut board, token, Dialect::Permissive) {
            debug!(error = %e, index = i, "Permissive replay stopped");
            if i == 0 {
                return Reconstruction::empty();
            }
            break;
        }
    }

    Reconstruction {
        position: Some(board.to_fen()),
        setup_move: None,
        strategy: Strategy::Fallback,
    }
}

fn start_board(fen: Option<&str>) -> Result<Board, NotationError> {
    Board::from_fen(fen.unwrap_or(STARTING_FEN))
}

// ========================================
// Strict tokenizer
// ========================================

/// Move tokens plus the optional `FEN` header of a transcript
#[derive(Debug, Default)]
struct Transcript {
    start_fen: Option<String>,
    moves: Vec<String>,
}

impl Transcript {
    fn parse(text: &str) -> Self {
        let mut transcript = Transcript::default();
        let mut chars = text.chars().peekable();
        let mut word = String::new();

        while let Some(c) = chars.next() {
            match c {
                '[' => {
                    transcript.push_word(&mut word);
                    let header: String = chars.by_ref().take_while(|&c| c != ']').collect();
                    if let Some(fen) = header_value(&header, "FEN") {
                        transcript.start_fen = Some(fen);
                    }
                }
                '{' => {
                    transcript.push_word(&mut word);
                    chars.by_ref().find(|&c| c == '}');
                }
                ';' => {
                    transcript.push_word(&mut word);
                    chars.by_ref().find(|&c| c == '\n');
                }
                '(' => {
                    transcript.push_word(&mut word);
                    let mut depth = 1;
                    for c in chars.by_ref() {
                        match c {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                c if c.is_whitespace() => transcript.push_word(&mut word),
                c => word.push(c),
            }
        }
        transcript.push_word(&mut word);
        transcript
    }

    fn push_word(&mut self, word: &mut String) {
        if word.is_empty() {
            return;
        }
        let token = std::mem::take(word);
        if token.starts_with('$') || is_result(&token) {
            return;
        }
        if let Some(mv) = strip_move_number(&token) {
            self.moves.push(mv.to_string());
        }
    }
}

/// `Tag "value"` → value when the tag name matches
fn header_value(header: &str, tag: &str) -> Option<String> {
    let (name, rest) = header.trim().split_once(char::is_whitespace)?;
    if name != tag {
        return None;
    }
    let value = rest.trim().trim_matches('"').trim();
    (!value.is_empty()).then(|| value.to_string())
}

// ========================================
// Permissive tokenizer
// ========================================

/// Header lines dropped, whitespace split, move numbers and results removed
fn loose_tokens(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .flat_map(str::split_whitespace)
        .filter(|token| !is_result(token))
        .filter_map(strip_move_number)
        .map(str::to_string)
        .collect()
}

fn is_result(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Remove a leading `12.` / `12...` marker; `None` when nothing remains
fn strip_move_number(token: &str) -> Option<&str> {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Some(token);
    }
    let after_digits = &token[digits..];
    let rest = after_digits.trim_start_matches('.');
    if rest.len() == after_digits.len() {
        // Digits without dots ("0-0" castling) are move text
        return Some(token);
    }
    (!rest.is_empty()).then_some(rest)
}
