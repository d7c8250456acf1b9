//! # CPN Common Library
//!
//! Shared code for the chess puzzle services including:
//! - Canonical puzzle model and difficulty tiers
//! - Raw upstream puzzle shapes and their canonical conversion
//! - Notation reconstruction (transcript replay to a position at a given ply)
//! - Configuration file resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod models;
pub mod notation;

pub use error::{Error, Result};
pub use models::{Difficulty, Puzzle, PuzzleSource};
