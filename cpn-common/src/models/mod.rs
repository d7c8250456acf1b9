//! Puzzle data model

pub mod difficulty;
pub mod puzzle;
pub mod raw;

pub use difficulty::Difficulty;
pub use puzzle::{Puzzle, PuzzleSource};
pub use raw::{RawGame, RawPuzzle, RawPuzzleResponse};
