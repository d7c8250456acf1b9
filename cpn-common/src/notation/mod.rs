//! Notation reconstruction
//!
//! Replays a compressed algebraic game transcript to recover the board
//! position (and the move that produced it) at a given ply.

pub mod board;
pub mod san;
pub mod transcript;

pub use board::{Board, Move, STARTING_FEN};
pub use san::Dialect;
pub use transcript::{reconstruct, Reconstruction, Strategy};

use thiserror::Error;

/// Errors raised while replaying notation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("invalid move token {token:?}: {reason}")]
    InvalidToken { token: String, reason: String },

    #[error("illegal move {token:?}: {reason}")]
    IllegalMove { token: String, reason: String },

    #[error("ambiguous move {0:?}")]
    Ambiguous(String),
}
