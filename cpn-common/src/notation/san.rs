//! Algebraic move parsing
//!
//! Two dialects:
//! - [`Dialect::Strict`]: standard algebraic notation as written in game
//!   records (`Nbd2`, `exd5`, `O-O-O`, `e8=Q+`). Capture markers must agree
//!   with the board.
//! - [`Dialect::Permissive`]: additionally accepts zero-castling (`0-0`),
//!   promotions without `=` or with a lowercase piece, missing or superfluous
//!   capture markers, and coordinate moves (`e2e4`, `e2-e4`, `e7e8q`).
//!
//! Check, mate and annotation suffixes (`+ # ! ?`) are ignored by both.

use super::board::{Board, Color, Move, PieceKind, Square};
use super::NotationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Strict,
    Permissive,
}

/// A parsed but not yet resolved move token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanMove {
    Castle {
        long: bool,
    },
    Normal {
        kind: PieceKind,
        from_file: Option<u8>,
        from_rank: Option<u8>,
        capture: bool,
        to: Square,
        promotion: Option<PieceKind>,
    },
    /// Coordinate form (permissive only)
    Coordinate {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
}

fn invalid(token: &str, reason: &str) -> NotationError {
    NotationError::InvalidToken {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

fn illegal(token: &str, reason: &str) -> NotationError {
    NotationError::IllegalMove {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

fn file_of(c: char) -> Option<u8> {
    ('a'..='h').contains(&c).then(|| c as u8 - b'a')
}

fn rank_of(c: char) -> Option<u8> {
    ('1'..='8').contains(&c).then(|| c as u8 - b'1')
}

fn promotion_piece(c: char, dialect: Dialect) -> Option<PieceKind> {
    let c = match dialect {
        Dialect::Strict => c,
        Dialect::Permissive => c.to_ascii_uppercase(),
    };
    PieceKind::from_san_letter(c).filter(|k| k.is_promotion_target())
}

/// Strip check/mate/annotation suffixes
fn strip_suffixes(token: &str) -> &str {
    token.trim_end_matches(['+', '#', '!', '?'])
}

/// Parse a move token without looking at the board
pub fn parse(token: &str, dialect: Dialect) -> Result<SanMove, NotationError> {
    let mut body = strip_suffixes(token.trim());
    if dialect == Dialect::Permissive {
        body = body.strip_suffix("e.p.").unwrap_or(body);
    }
    if body.is_empty() {
        return Err(invalid(token, "empty move"));
    }

    match body {
        "O-O" => return Ok(SanMove::Castle { long: false }),
        "O-O-O" => return Ok(SanMove::Castle { long: true }),
        "0-0" if dialect == Dialect::Permissive => return Ok(SanMove::Castle { long: false }),
        "0-0-0" if dialect == Dialect::Permissive => return Ok(SanMove::Castle { long: true }),
        _ => {}
    }

    if dialect == Dialect::Permissive {
        if let Some(coordinate) = parse_coordinate(body) {
            return Ok(coordinate);
        }
    }

    let mut chars: Vec<char> = body.chars().collect();

    let kind = match chars.first().and_then(|c| PieceKind::from_san_letter(*c)) {
        Some(kind) => {
            chars.remove(0);
            kind
        }
        None => PieceKind::Pawn,
    };

    // Promotion suffix: "=Q" (both), "Q" or "=q"/"q" (permissive)
    let mut promotion = None;
    if chars.len() >= 2 {
        let last = chars[chars.len() - 1];
        let before = chars[chars.len() - 2];
        if before == '=' {
            promotion = Some(
                promotion_piece(last, dialect)
                    .ok_or_else(|| invalid(token, "bad promotion piece"))?,
            );
            chars.truncate(chars.len() - 2);
        } else if dialect == Dialect::Permissive && rank_of(before).is_some() {
            if let Some(piece) = promotion_piece(last, dialect) {
                promotion = Some(piece);
                chars.truncate(chars.len() - 1);
            }
        }
    }

    if chars.len() < 2 {
        return Err(invalid(token, "missing destination square"));
    }
    let dest: String = chars[chars.len() - 2..].iter().collect();
    let to = Square::parse(&dest).ok_or_else(|| invalid(token, "bad destination square"))?;
    chars.truncate(chars.len() - 2);

    let mut capture = false;
    if chars.last() == Some(&'x') {
        capture = true;
        chars.pop();
    }

    let (from_file, from_rank) = match chars.as_slice() {
        [] => (None, None),
        [c] => match (file_of(*c), rank_of(*c)) {
            (Some(f), _) => (Some(f), None),
            (_, Some(r)) => (None, Some(r)),
            _ => return Err(invalid(token, "bad disambiguation")),
        },
        [f, r] => match (file_of(*f), rank_of(*r)) {
            (Some(f), Some(r)) => (Some(f), Some(r)),
            _ => return Err(invalid(token, "bad disambiguation")),
        },
        _ => return Err(invalid(token, "unrecognised move text")),
    };

    if kind == PieceKind::Pawn {
        if from_rank.is_some() && dialect == Dialect::Strict {
            return Err(invalid(token, "pawn moves take a file, not a rank"));
        }
        if capture && from_file.is_none() {
            return Err(invalid(token, "pawn capture without origin file"));
        }
        if dialect == Dialect::Strict && from_file.is_some() && !capture {
            return Err(invalid(token, "pawn origin file without capture"));
        }
    } else if promotion.is_some() {
        return Err(invalid(token, "only pawns promote"));
    }

    Ok(SanMove::Normal {
        kind,
        from_file,
        from_rank,
        capture,
        to,
        promotion,
    })
}

/// `e2e4`, `e2-e4`, `e2xe4`, `e7e8q`, `e7e8=Q`
fn parse_coordinate(body: &str) -> Option<SanMove> {
    let compact: String = body.chars().filter(|c| !matches!(c, '-' | 'x' | '=')).collect();
    let lower = compact.to_ascii_lowercase();
    if lower.len() != 4 && lower.len() != 5 {
        return None;
    }
    // Coordinate moves start with a lowercase file in the original text
    if !body.starts_with(|c: char| ('a'..='h').contains(&c)) {
        return None;
    }
    let from = Square::parse(&lower[0..2])?;
    let to = Square::parse(&lower[2..4])?;
    let promotion = match lower.chars().nth(4) {
        Some(c) => Some(promotion_piece(c, Dialect::Permissive)?),
        None => None,
    };
    Some(SanMove::Coordinate {
        from,
        to,
        promotion,
    })
}

/// Resolve a parsed move against a position
pub fn resolve(
    board: &Board,
    san: SanMove,
    token: &str,
    dialect: Dialect,
) -> Result<Move, NotationError> {
    match san {
        SanMove::Castle { long } => board
            .castle_move(long)
            .ok_or_else(|| illegal(token, "castling not available")),

        SanMove::Coordinate {
            from,
            to,
            promotion,
        } => {
            let mut mv = Move::new(from, to, promotion);
            // Coordinate promotions default to a queen
            if mv.promotion.is_none() && !board.is_legal(mv) {
                let queen = Move::new(from, to, Some(PieceKind::Queen));
                if board.is_legal(queen) {
                    mv = queen;
                }
            }
            if board.is_legal(mv) {
                Ok(mv)
            } else {
                Err(illegal(token, "not legal in this position"))
            }
        }

        SanMove::Normal {
            kind,
            from_file,
            from_rank,
            capture,
            to,
            promotion,
        } => {
            let mut promotion = promotion;
            if dialect == Dialect::Permissive && promotion.is_none() && kind == PieceKind::Pawn {
                let last_rank = match board.side_to_move() {
                    Color::White => 7,
                    Color::Black => 0,
                };
                if to.rank() == last_rank {
                    promotion = Some(PieceKind::Queen);
                }
            }

            let candidates: Vec<Move> = board
                .own_pieces(kind)
                .filter(|from| from_file.map_or(true, |f| from.file() == f))
                .filter(|from| from_rank.map_or(true, |r| from.rank() == r))
                .map(|from| Move::new(from, to, promotion))
                .filter(|mv| board.is_legal(*mv))
                .collect();

            let mv = match candidates.as_slice() {
                [] => return Err(illegal(token, "no piece can make this move")),
                [only] => *only,
                _ => return Err(NotationError::Ambiguous(token.to_string())),
            };

            if dialect == Dialect::Strict {
                let takes = board.piece_at(to).is_some()
                    || (kind == PieceKind::Pawn && board.en_passant() == Some(to));
                if takes != capture {
                    return Err(illegal(token, "capture marker does not match the board"));
                }
            }

            Ok(mv)
        }
    }
}

/// Parse, resolve and play one token; returns the move played
pub fn play(board: &mut Board, token: &str, dialect: Dialect) -> Result<Move, NotationError> {
    let san = parse(token, dialect)?;
    let mv = resolve(board, san, token, dialect)?;
    board.play(mv)?;
    Ok(mv)
}
