//! Difficulty tiers
//!
//! Three ordered bands over the puzzle rating scale. Each tier carries an
//! inclusive rating range used for classification and the filter token the
//! Lichess puzzle API understands.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Puzzle difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// All tiers, easiest first
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Inclusive rating band for this tier.
    ///
    /// Bands are contiguous. Ratings above the hard band's upper bound still
    /// classify as hard, ratings below zero as easy.
    pub fn rating_bounds(self) -> RangeInclusive<i32> {
        match self {
            Difficulty::Easy => 0..=1299,
            Difficulty::Medium => 1300..=1799,
            Difficulty::Hard => 1800..=9999,
        }
    }

    /// Classify an arbitrary rating
    pub fn from_rating(rating: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| tier.rating_bounds().contains(&rating))
            .unwrap_or(if rating < 0 {
                Difficulty::Easy
            } else {
                Difficulty::Hard
            })
    }

    /// Lichess `/api/puzzle/next` difficulty parameter
    pub fn lichess_token(self) -> &'static str {
        match self {
            Difficulty::Easy => "easiest",
            Difficulty::Medium => "normal",
            Difficulty::Hard => "hardest",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Dense index (0..3), easiest first
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse an optional tier argument.
    ///
    /// Empty (after trimming) means "no tier requested"; anything else must
    /// name one of the three tiers (case-insensitive).
    pub fn parse_optional(raw: &str) -> crate::Result<Option<Self>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(Error::InvalidInput(format!(
                "unknown difficulty {:?}; valid values: easy, medium, hard",
                other
            ))),
        }
    }
}
