//! Board model: colors, pieces, squares and the 8x8 grid.
//!
//! Row 0 is the top of the board (black's back rank) and row 7 the bottom
//! (white's back rank). Columns run left to right. The board holds plain data
//! only; the session applies validated moves through `take`/`place`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_SIZE: usize = 8;

const BACK_RANK: [PieceKind; BOARD_SIZE] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta of a single pawn step: white moves up the board, black down.
    pub fn pawn_direction(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn pawn_start_row(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    fn back_row(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

impl PieceKind {
    /// Single-letter notation, used by text renderers and logs.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Rook => 'R',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Rook => "rook",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        };
        f.write_str(name)
    }
}

/// A piece is a plain value; identity is its position on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.kind)
    }
}

/// Board coordinate as it travels on the wire.
///
/// Coordinates are not validated on construction because a peer can send
/// anything; use [`Square::is_on_board`] before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn is_on_board(self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// Returns the square shifted by the given deltas, or `None` if it falls off the board.
    pub fn offset(self, d_row: i8, d_col: i8) -> Option<Square> {
        let row = self.row as i16 + d_row as i16;
        let col = self.col as i16 + d_col as i16;
        let size = BOARD_SIZE as i16;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Square::new(row as u8, col as u8))
        } else {
            None
        }
    }

    /// Every square on the board in row-major order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_SIZE as u8)
            .flat_map(|row| (0..BOARD_SIZE as u8).map(move |col| Square::new(row, col)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Standard starting position.
    pub fn initial() -> Self {
        let mut board = Self::empty();
        for color in [Color::White, Color::Black] {
            let back = color.back_row() as usize;
            let pawns = color.pawn_start_row() as usize;
            for (col, kind) in BACK_RANK.iter().enumerate() {
                board.cells[back][col] = Some(Piece::new(*kind, color));
                board.cells[pawns][col] = Some(Piece::new(PieceKind::Pawn, color));
            }
        }
        board
    }

    /// Piece on `square`; off-board squares are always empty.
    pub fn get(&self, square: Square) -> Option<Piece> {
        if !square.is_on_board() {
            return None;
        }
        self.cells[square.row as usize][square.col as usize]
    }

    pub fn is_empty(&self, square: Square) -> bool {
        self.get(square).is_none()
    }

    /// Puts `piece` on `square`, returning whatever was there. Off-board writes are ignored.
    pub fn place(&mut self, square: Square, piece: Piece) -> Option<Piece> {
        if !square.is_on_board() {
            return None;
        }
        self.cells[square.row as usize][square.col as usize].replace(piece)
    }

    /// Clears `square`, returning the piece that stood there.
    pub fn take(&mut self, square: Square) -> Option<Piece> {
        if !square.is_on_board() {
            return None;
        }
        self.cells[square.row as usize][square.col as usize].take()
    }

    /// Occupied squares in row-major order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |square| self.get(square).map(|piece| (square, piece)))
    }

    pub fn has_king(&self, color: Color) -> bool {
        self.pieces()
            .any(|(_, piece)| piece.kind == PieceKind::King && piece.color == color)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_layout() {
        let board = Board::initial();

        assert_eq!(board.pieces().count(), 32);
        for col in 0..8 {
            assert_eq!(
                board.get(Square::new(6, col)),
                Some(Piece::new(PieceKind::Pawn, Color::White))
            );
            assert_eq!(
                board.get(Square::new(1, col)),
                Some(Piece::new(PieceKind::Pawn, Color::Black))
            );
        }
        assert_eq!(
            board.get(Square::new(7, 3)),
            Some(Piece::new(PieceKind::Queen, Color::White))
        );
        assert_eq!(
            board.get(Square::new(0, 4)),
            Some(Piece::new(PieceKind::King, Color::Black))
        );
        assert_eq!(
            board.get(Square::new(0, 6)),
            Some(Piece::new(PieceKind::Knight, Color::Black))
        );
        for row in 2..6 {
            for col in 0..8 {
                assert!(board.is_empty(Square::new(row, col)));
            }
        }
    }

    #[test]
    fn test_back_ranks_mirror() {
        let board = Board::initial();
        for col in 0..8 {
            let white = board.get(Square::new(7, col)).unwrap();
            let black = board.get(Square::new(0, col)).unwrap();
            assert_eq!(white.kind, black.kind);
            assert_eq!(white.color, Color::White);
            assert_eq!(black.color, Color::Black);
        }
    }

    #[test]
    fn test_off_board_access() {
        let mut board = Board::initial();
        let outside = Square::new(8, 0);

        assert!(!outside.is_on_board());
        assert_eq!(board.get(outside), None);
        assert_eq!(board.take(Square::new(0, 200)), None);
        assert_eq!(
            board.place(outside, Piece::new(PieceKind::Queen, Color::White)),
            None
        );
        assert_eq!(board, Board::initial());
    }

    #[test]
    fn test_place_and_take() {
        let mut board = Board::empty();
        let square = Square::new(3, 3);
        let rook = Piece::new(PieceKind::Rook, Color::Black);

        assert_eq!(board.place(square, rook), None);
        assert_eq!(board.get(square), Some(rook));
        assert_eq!(board.take(square), Some(rook));
        assert!(board.is_empty(square));
    }

    #[test]
    fn test_square_offset() {
        let corner = Square::new(0, 0);
        assert_eq!(corner.offset(1, 1), Some(Square::new(1, 1)));
        assert_eq!(corner.offset(-1, 0), None);
        assert_eq!(Square::new(7, 7).offset(0, 1), None);
        assert_eq!(Square::all().count(), 64);
    }

    #[test]
    fn test_has_king() {
        let mut board = Board::initial();
        assert!(board.has_king(Color::White));
        assert!(board.has_king(Color::Black));

        board.take(Square::new(0, 4));
        assert!(board.has_king(Color::White));
        assert!(!board.has_king(Color::Black));
    }

    #[test]
    fn test_color_helpers() {
        assert_eq!(Color::White.opponent(), Color::Black);
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(Color::White.pawn_direction(), -1);
        assert_eq!(Color::Black.pawn_start_row(), 1);
        assert_eq!(Color::White.to_string(), "white");
    }
}
