//! Move legality engine.
//!
//! These functions are the only definition of piece movement in the
//! workspace. The server uses them to accept or reject proposals and the
//! client uses them to highlight destinations, so both sides always agree.
//!
//! There is no notion of check: a move that leaves the mover's king
//! capturable is legal, and kings are captured like any other piece. Castling,
//! en passant and promotion are not part of the rule set.

use crate::board::{Board, Color, PieceKind, Square};

/// Decides whether `mover` may move the piece on `from` to `to`.
///
/// Pure and deterministic. Off-board coordinates, an empty origin and an
/// origin holding an opponent piece are all illegal.
pub fn is_legal(board: &Board, mover: Color, from: Square, to: Square) -> bool {
    if !from.is_on_board() || !to.is_on_board() {
        return false;
    }
    if from == to {
        return false;
    }

    let piece = match board.get(from) {
        Some(piece) if piece.color == mover => piece,
        _ => return false,
    };

    if let Some(target) = board.get(to) {
        if target.color == mover {
            return false;
        }
    }

    let d_row = to.row as i8 - from.row as i8;
    let d_col = to.col as i8 - from.col as i8;

    match piece.kind {
        PieceKind::Pawn => is_pawn_move(board, mover, from, to, d_row, d_col),
        PieceKind::Rook => is_rook_move(board, from, to, d_row, d_col),
        PieceKind::Knight => is_knight_move(d_row, d_col),
        PieceKind::Bishop => is_bishop_move(board, from, to, d_row, d_col),
        PieceKind::Queen => {
            is_rook_move(board, from, to, d_row, d_col)
                || is_bishop_move(board, from, to, d_row, d_col)
        }
        PieceKind::King => is_king_move(d_row, d_col),
    }
}

/// All squares the piece on `from` may legally move to, for its own color.
pub fn legal_destinations(board: &Board, from: Square) -> Vec<Square> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };

    Square::all()
        .filter(|to| is_legal(board, piece.color, from, *to))
        .collect()
}

fn is_pawn_move(
    board: &Board,
    mover: Color,
    from: Square,
    to: Square,
    d_row: i8,
    d_col: i8,
) -> bool {
    let direction = mover.pawn_direction();
    let target_empty = board.is_empty(to);

    if d_col == 0 && target_empty {
        if d_row == direction {
            return true;
        }
        if from.row == mover.pawn_start_row() && d_row == 2 * direction {
            // The square being jumped over must be empty as well.
            return from
                .offset(direction, 0)
                .map(|between| board.is_empty(between))
                .unwrap_or(false);
        }
    }

    d_col.abs() == 1 && d_row == direction && !target_empty
}

fn is_rook_move(board: &Board, from: Square, to: Square, d_row: i8, d_col: i8) -> bool {
    if d_row != 0 && d_col != 0 {
        return false;
    }
    is_path_clear(board, from, to)
}

fn is_knight_move(d_row: i8, d_col: i8) -> bool {
    matches!((d_row.abs(), d_col.abs()), (2, 1) | (1, 2))
}

fn is_bishop_move(board: &Board, from: Square, to: Square, d_row: i8, d_col: i8) -> bool {
    if d_row.abs() != d_col.abs() {
        return false;
    }
    is_path_clear(board, from, to)
}

fn is_king_move(d_row: i8, d_col: i8) -> bool {
    d_row.abs() <= 1 && d_col.abs() <= 1
}

/// Walks from one past `from` up to (excluding) `to` and reports whether every
/// square in between is empty. Callers guarantee a straight or diagonal line.
fn is_path_clear(board: &Board, from: Square, to: Square) -> bool {
    let row_step = (to.row as i8 - from.row as i8).signum();
    let col_step = (to.col as i8 - from.col as i8).signum();

    let mut current = from;
    loop {
        current = match current.offset(row_step, col_step) {
            Some(next) => next,
            None => return false,
        };
        if current == to {
            return true;
        }
        if !board.is_empty(current) {
            return false;
        }
    }
}
