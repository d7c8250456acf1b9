//! Board model
//!
//! Just enough chess to replay a game transcript: piece placement, side to
//! move, castling rights, en-passant square and the two FEN counters, plus
//! the move-legality checks needed to disambiguate algebraic notation.
//! There is no search and no move ordering.

use super::NotationError;
use std::fmt;

/// Standard starting position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank direction pawns of this color advance in
    fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Parse an uppercase SAN piece letter (`N`, `B`, `R`, `Q`, `K`, `P`)
    pub fn from_san_letter(c: char) -> Option<Self> {
        match c {
            'P' => Some(PieceKind::Pawn),
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Lowercase letter used in coordinate notation and black FEN pieces
    pub fn lower_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn is_promotion_target(self) -> bool {
        matches!(
            self,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    pub fn from_fen_char(c: char) -> Option<Self> {
        let kind = PieceKind::from_san_letter(c.to_ascii_uppercase())?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { color, kind })
    }

    pub fn fen_char(self) -> char {
        let c = self.kind.lower_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}

/// Board square, `a1` = 0 through `h8` = 63
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square(u8);

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// Parse `e4` style coordinates (lowercase file)
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].checked_sub(b'a')?;
        let rank = bytes[1].checked_sub(b'1')?;
        Self::new(file, rank)
    }

    pub fn file(self) -> u8 {
        self.0 % 8
    }

    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Square shifted by (files, ranks), if still on the board
    pub fn offset(self, df: i8, dr: i8) -> Option<Self> {
        let file = self.file() as i8 + df;
        let rank = self.rank() as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Self::new(file as u8, rank as u8)
        } else {
            None
        }
    }

    fn all() -> impl Iterator<Item = Square> {
        (0u8..64).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file()) as char,
            (b'1' + self.rank()) as char
        )
    }
}

/// A move in coordinate form. Castling is the king's two-square move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: Square, to: Square, promotion: Option<PieceKind>) -> Self {
        Self {
            from,
            to,
            promotion,
        }
    }
}

/// Coordinate notation: `e2e4`, `e7e8q`
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.lower_char())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct CastlingRights {
    white_king: bool,
    white_queen: bool,
    black_king: bool,
    black_queen: bool,
}

impl CastlingRights {
    fn get(&self, color: Color, long: bool) -> bool {
        match (color, long) {
            (Color::White, false) => self.white_king,
            (Color::White, true) => self.white_queen,
            (Color::Black, false) => self.black_king,
            (Color::Black, true) => self.black_queen,
        }
    }

    fn clear(&mut self, color: Color) {
        match color {
            Color::White => {
                self.white_king = false;
                self.white_queen = false;
            }
            Color::Black => {
                self.black_king = false;
                self.black_queen = false;
            }
        }
    }

    /// Drop the right tied to a rook home square touched by a move
    fn clear_for_square(&mut self, sq: Square) {
        match (sq.file(), sq.rank()) {
            (0, 0) => self.white_queen = false,
            (7, 0) => self.white_king = false,
            (0, 7) => self.black_queen = false,
            (7, 7) => self.black_king = false,
            _ => {}
        }
    }

    fn fen(&self) -> String {
        let mut out = String::new();
        if self.white_king {
            out.push('K');
        }
        if self.white_queen {
            out.push('Q');
        }
        if self.black_king {
            out.push('k');
        }
        if self.black_queen {
            out.push('q');
        }
        if out.is_empty() {
            out.push('-');
        }
        out
    }
}

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// Position at one point of a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Piece>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::starting()
    }
}

impl Board {
    /// Standard starting position
    pub fn starting() -> Self {
        let mut squares = [None; 64];
        let back = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back.iter().enumerate() {
            squares[file] = Some(Piece::new(Color::White, *kind));
            squares[8 + file] = Some(Piece::new(Color::White, PieceKind::Pawn));
            squares[48 + file] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            squares[56 + file] = Some(Piece::new(Color::Black, *kind));
        }

        Self {
            squares,
            side_to_move: Color::White,
            castling: CastlingRights {
                white_king: true,
                white_queen: true,
                black_king: true,
                black_queen: true,
            },
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Parse a FEN string. The two counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Self, NotationError> {
        let invalid = |why: &str| NotationError::InvalidFen(format!("{}: {}", why, fen));
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 || fields.len() > 6 {
            return Err(invalid("expected 4 to 6 fields"));
        }

        let mut squares = [None; 64];
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(invalid("expected 8 ranks"));
        }
        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file: u8 = 0;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(invalid("bad empty-square count"));
                    }
                    file += skip as u8;
                } else {
                    let piece = Piece::from_fen_char(c).ok_or_else(|| invalid("bad piece"))?;
                    let sq = Square::new(file, rank).ok_or_else(|| invalid("rank overflow"))?;
                    squares[sq.index()] = Some(piece);
                    file += 1;
                }
                if file > 8 {
                    return Err(invalid("rank overflow"));
                }
            }
            if file != 8 {
                return Err(invalid("rank does not cover 8 files"));
            }
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(invalid("bad side to move")),
        };

        let mut castling = CastlingRights::default();
        if fields[2] != "-" {
            for c in fields[2].chars() {
                match c {
                    'K' => castling.white_king = true,
                    'Q' => castling.white_queen = true,
                    'k' => castling.black_king = true,
                    'q' => castling.black_queen = true,
                    _ => return Err(invalid("bad castling rights")),
                }
            }
        }

        let en_passant = match fields[3] {
            "-" => None,
            text => Some(Square::parse(text).ok_or_else(|| invalid("bad en-passant square"))?),
        };

        let halfmove_clock = match fields.get(4) {
            Some(text) => text.parse().map_err(|_| invalid("bad halfmove clock"))?,
            None => 0,
        };
        let fullmove_number = match fields.get(5) {
            Some(text) => text.parse().map_err(|_| invalid("bad fullmove number"))?,
            None => 1,
        };

        Ok(Self {
            squares,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Render as a 6-field FEN string
    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let en_passant = self
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} {} {}",
            placement,
            side,
            self.castling.fen(),
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    /// Squares holding a piece of the side to move with the given kind
    pub fn own_pieces(&self, kind: PieceKind) -> impl Iterator<Item = Square> + '_ {
        let color = self.side_to_move;
        Square::all().filter(move |sq| {
            self.piece_at(*sq) == Some(Piece::new(color, kind))
        })
    }

    fn king_square(&self, color: Color) -> Option<Square> {
        Square::all().find(|sq| self.piece_at(*sq) == Some(Piece::new(color, PieceKind::King)))
    }

    /// True when the piece standing on `from` attacks `target`
    fn attacks(&self, from: Square, target: Square) -> bool {
        let Some(piece) = self.piece_at(from) else {
            return false;
        };
        if from == target {
            return false;
        }
        let df = target.file() as i8 - from.file() as i8;
        let dr = target.rank() as i8 - from.rank() as i8;

        match piece.kind {
            PieceKind::Pawn => dr == piece.color.forward() && df.abs() == 1,
            PieceKind::Knight => KNIGHT_STEPS.contains(&(df, dr)),
            PieceKind::King => df.abs() <= 1 && dr.abs() <= 1,
            PieceKind::Bishop => df.abs() == dr.abs() && self.ray_clear(from, target),
            PieceKind::Rook => (df == 0 || dr == 0) && self.ray_clear(from, target),
            PieceKind::Queen => {
                (df == 0 || dr == 0 || df.abs() == dr.abs()) && self.ray_clear(from, target)
            }
        }
    }

    /// Squares strictly between `from` and `to` on a line are all empty
    fn ray_clear(&self, from: Square, to: Square) -> bool {
        let step_f = (to.file() as i8 - from.file() as i8).signum();
        let step_r = (to.rank() as i8 - from.rank() as i8).signum();
        let mut current = from;
        loop {
            current = match current.offset(step_f, step_r) {
                Some(sq) => sq,
                None => return false,
            };
            if current == to {
                return true;
            }
            if self.piece_at(current).is_some() {
                return false;
            }
        }
    }

    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        Square::all().any(|from| {
            matches!(self.piece_at(from), Some(p) if p.color == by) && self.attacks(from, sq)
        })
    }

    pub fn in_check(&self, color: Color) -> bool {
        self.king_square(color)
            .map(|king| self.is_square_attacked(king, color.opposite()))
            .unwrap_or(false)
    }

    /// Geometric reachability ignoring king safety (castling excluded)
    fn pseudo_reach(&self, from: Square, to: Square) -> bool {
        let Some(piece) = self.piece_at(from) else {
            return false;
        };
        let target = self.piece_at(to);
        if matches!(target, Some(p) if p.color == piece.color) {
            return false;
        }

        if piece.kind != PieceKind::Pawn {
            return self.attacks(from, to);
        }

        let forward = piece.color.forward();
        let df = to.file() as i8 - from.file() as i8;
        let dr = to.rank() as i8 - from.rank() as i8;

        if df == 0 {
            if target.is_some() {
                return false;
            }
            if dr == forward {
                return true;
            }
            let start_rank = match piece.color {
                Color::White => 1,
                Color::Black => 6,
            };
            if dr == 2 * forward && from.rank() == start_rank {
                return from
                    .offset(0, forward)
                    .map(|mid| self.piece_at(mid).is_none())
                    .unwrap_or(false);
            }
            return false;
        }

        df.abs() == 1
            && dr == forward
            && (target.is_some() || self.en_passant == Some(to))
    }

    /// Castling move for the side to move, if currently legal
    pub fn castle_move(&self, long: bool) -> Option<Move> {
        let color = self.side_to_move;
        let rank = color.back_rank();
        let king_from = Square::new(4, rank)?;
        let rook_from = Square::new(if long { 0 } else { 7 }, rank)?;

        if !self.castling.get(color, long)
            || self.piece_at(king_from) != Some(Piece::new(color, PieceKind::King))
            || self.piece_at(rook_from) != Some(Piece::new(color, PieceKind::Rook))
        {
            return None;
        }

        let between: &[u8] = if long { &[1, 2, 3] } else { &[5, 6] };
        let king_path: &[u8] = if long { &[3, 2] } else { &[5, 6] };

        if between
            .iter()
            .any(|file| Square::new(*file, rank).and_then(|sq| self.piece_at(sq)).is_some())
        {
            return None;
        }

        let enemy = color.opposite();
        if self.is_square_attacked(king_from, enemy) {
            return None;
        }
        for file in king_path {
            let sq = Square::new(*file, rank)?;
            if self.is_square_attacked(sq, enemy) {
                return None;
            }
        }

        Some(Move::new(king_from, Square::new(if long { 2 } else { 6 }, rank)?, None))
    }

    fn is_castling(&self, mv: Move) -> bool {
        matches!(self.piece_at(mv.from), Some(p) if is_king_two_step(p, mv))
    }

    /// Full legality check for the side to move
    pub fn is_legal(&self, mv: Move) -> bool {
        let Some(piece) = self.piece_at(mv.from) else {
            return false;
        };
        if piece.color != self.side_to_move {
            return false;
        }

        if self.is_castling(mv) {
            let long = mv.to.file() < mv.from.file();
            return mv.promotion.is_none() && self.castle_move(long) == Some(mv);
        }

        let reaches_last_rank =
            piece.kind == PieceKind::Pawn && mv.to.rank() == piece.color.opposite().back_rank();
        match mv.promotion {
            Some(kind) if !reaches_last_rank || !kind.is_promotion_target() => return false,
            None if reaches_last_rank => return false,
            _ => {}
        }

        if !self.pseudo_reach(mv.from, mv.to) {
            return false;
        }

        let mut next = self.clone();
        next.apply_unchecked(mv);
        !next.in_check(piece.color)
    }

    /// Play a move after checking legality
    pub fn play(&mut self, mv: Move) -> Result<(), NotationError> {
        if !self.is_legal(mv) {
            return Err(NotationError::IllegalMove {
                token: mv.to_string(),
                reason: "not legal in this position".to_string(),
            });
        }
        self.apply_unchecked(mv);
        Ok(())
    }

    fn apply_unchecked(&mut self, mv: Move) {
        let Some(piece) = self.squares[mv.from.index()].take() else {
            return;
        };
        let captured = self.squares[mv.to.index()];
        let mut is_capture = captured.is_some();

        if piece.kind == PieceKind::Pawn
            && captured.is_none()
            && self.en_passant == Some(mv.to)
            && mv.from.file() != mv.to.file()
        {
            if let Some(victim) = Square::new(mv.to.file(), mv.from.rank()) {
                self.squares[victim.index()] = None;
                is_capture = true;
            }
        }

        if is_king_two_step(piece, mv) {
            let rank = mv.from.rank();
            let (rook_from, rook_to) = if mv.to.file() > mv.from.file() {
                (7, 5)
            } else {
                (0, 3)
            };
            if let (Some(rf), Some(rt)) = (Square::new(rook_from, rank), Square::new(rook_to, rank))
            {
                let rook = self.squares[rf.index()].take();
                self.squares[rt.index()] = rook;
            }
        }

        let placed = match mv.promotion {
            Some(kind) if piece.kind == PieceKind::Pawn => Piece::new(piece.color, kind),
            _ => piece,
        };
        self.squares[mv.to.index()] = Some(placed);

        if piece.kind == PieceKind::King {
            self.castling.clear(piece.color);
        }
        self.castling.clear_for_square(mv.from);
        self.castling.clear_for_square(mv.to);

        let rank_jump = mv.to.rank() as i8 - mv.from.rank() as i8;
        self.en_passant = if piece.kind == PieceKind::Pawn && rank_jump.abs() == 2 {
            mv.from.offset(0, rank_jump / 2)
        } else {
            None
        };

        if piece.kind == PieceKind::Pawn || is_capture {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if piece.color == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        self.side_to_move = piece.color.opposite();
    }
}

/// A king moving two files along its rank is castling
fn is_king_two_step(piece: Piece, mv: Move) -> bool {
    piece.kind == PieceKind::King
        && mv.from.rank() == mv.to.rank()
        && (mv.to.file() as i8 - mv.from.file() as i8).abs() == 2
}
