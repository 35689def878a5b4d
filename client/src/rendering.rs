use crate::game::{ClientGameState, GameOutcome};
use crate::input::ChatInput;
use macroquad::prelude::*;
use shared::{Piece, PieceKind, Square, BOARD_SIZE};

const LIGHT_SQUARE: Color = Color::new(0.94, 0.85, 0.71, 1.0);
const DARK_SQUARE: Color = Color::new(0.71, 0.53, 0.39, 1.0);
const SELECTED: Color = Color::new(0.96, 0.96, 0.41, 0.8);
const TARGET: Color = Color::new(0.47, 0.78, 0.47, 0.6);
const LAST_MOVE: Color = Color::new(0.8, 0.8, 0.3, 0.35);
const PANEL_TEXT: Color = Color::new(0.9, 0.9, 0.9, 1.0);

/// Maps between screen pixels and board squares.
///
/// White sees row 7 at the bottom; the board is turned around for black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    pub origin_x: f32,
    pub origin_y: f32,
    pub square_size: f32,
    pub flipped: bool,
}

impl BoardLayout {
    /// Largest square board that fits in the left part of a window of this size.
    pub fn fit(width: f32, height: f32, panel_width: f32, flipped: bool) -> Self {
        let margin = 20.0;
        let available = (width - panel_width - 2.0 * margin).min(height - 2.0 * margin);
        let square_size = (available / BOARD_SIZE as f32).max(1.0).floor();
        Self {
            origin_x: margin,
            origin_y: ((height - square_size * BOARD_SIZE as f32) / 2.0).max(0.0),
            square_size,
            flipped,
        }
    }

    pub fn board_size(&self) -> f32 {
        self.square_size * BOARD_SIZE as f32
    }

    /// Top-left pixel of `square`.
    pub fn square_origin(&self, square: Square) -> (f32, f32) {
        let (row, col) = self.display_cell(square.row, square.col);
        (
            self.origin_x + col as f32 * self.square_size,
            self.origin_y + row as f32 * self.square_size,
        )
    }

    pub fn square_at(&self, x: f32, y: f32) -> Option<Square> {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        if dx < 0.0 || dy < 0.0 || dx >= self.board_size() || dy >= self.board_size() {
            return None;
        }
        let col = (dx / self.square_size) as u8;
        let row = (dy / self.square_size) as u8;
        let (row, col) = self.display_cell(row, col);
        Some(Square::new(row, col))
    }

    // Flipping is its own inverse, so this maps both ways.
    fn display_cell(&self, row: u8, col: u8) -> (u8, u8) {
        let last = BOARD_SIZE as u8 - 1;
        if self.flipped {
            (last - row, last - col)
        } else {
            (row, col)
        }
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
    panel_width: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
            panel_width: 260.0,
        }
    }

    /// Layout for the current window size and player perspective.
    pub fn layout(&mut self, flipped: bool) -> BoardLayout {
        self.width = screen_width();
        self.height = screen_height();
        BoardLayout::fit(self.width, self.height, self.panel_width, flipped)
    }

    pub fn render(&mut self, state: &ClientGameState, chat: &ChatInput, layout: &BoardLayout) {
        clear_background(Color::from_rgba(38, 36, 33, 255));

        self.draw_board(state, layout);
        self.draw_panel(state, chat, layout);

        if let GameOutcome::KingCaptured { loser } = state.outcome() {
            self.draw_game_over(loser.opponent(), layout);
        }
    }

    fn draw_board(&self, state: &ClientGameState, layout: &BoardLayout) {
        let size = layout.square_size;

        for square in Square::all() {
            let (x, y) = layout.square_origin(square);
            let color = if (square.row + square.col) % 2 == 0 {
                LIGHT_SQUARE
            } else {
                DARK_SQUARE
            };
            draw_rectangle(x, y, size, size, color);
        }

        let Some(snapshot) = &state.snapshot else {
            self.draw_centered("Waiting for game state...", layout, 24.0);
            return;
        };

        if let Some(last) = snapshot.move_history.last() {
            for square in [last.from, last.to] {
                let (x, y) = layout.square_origin(square);
                draw_rectangle(x, y, size, size, LAST_MOVE);
            }
        }

        if let Some(selected) = state.selected {
            let (x, y) = layout.square_origin(selected);
            draw_rectangle(x, y, size, size, SELECTED);
        }

        for target in state.highlighted_targets() {
            let (x, y) = layout.square_origin(target);
            draw_circle(x + size / 2.0, y + size / 2.0, size * 0.15, TARGET);
        }

        for (square, piece) in snapshot.board.pieces() {
            let (x, y) = layout.square_origin(square);
            self.draw_piece(piece, x + size / 2.0, y + size / 2.0, size * 0.38);
        }
    }

    fn draw_piece(&self, piece: Piece, cx: f32, cy: f32, radius: f32) {
        let (fill, ink) = match piece.color {
            shared::Color::White => (Color::from_rgba(250, 250, 245, 255), BLACK),
            shared::Color::Black => (Color::from_rgba(30, 30, 30, 255), WHITE),
        };
        let radius = if piece.kind == PieceKind::Pawn {
            radius * 0.8
        } else {
            radius
        };

        draw_circle(cx, cy, radius, fill);
        draw_circle_lines(cx, cy, radius, 2.0, GRAY);

        let letter = piece.kind.letter().to_string();
        let font_size = (radius * 1.3) as u16;
        let dims = measure_text(&letter, None, font_size, 1.0);
        draw_text(
            &letter,
            cx - dims.width / 2.0,
            cy + dims.offset_y / 2.0,
            font_size as f32,
            ink,
        );
    }

    fn draw_panel(&self, state: &ClientGameState, chat: &ChatInput, layout: &BoardLayout) {
        let x = layout.origin_x + layout.board_size() + 20.0;
        let mut y = layout.origin_y + 20.0;
        let line = 22.0;

        let role = match state.role {
            Some(role) => format!("You: {}", role),
            None => "Connecting...".to_string(),
        };
        draw_text(&role, x, y, 22.0, PANEL_TEXT);
        y += line;

        if let Some(snapshot) = &state.snapshot {
            let turn = if state.is_my_turn() {
                "Your turn".to_string()
            } else {
                format!("{} to move", snapshot.current_turn)
            };
            draw_text(&turn, x, y, 20.0, PANEL_TEXT);
            y += line;

            draw_text(
                &format!("Moves played: {}", snapshot.move_history.len()),
                x,
                y,
                18.0,
                GRAY,
            );
            y += line * 1.5;

            for capturer in [shared::Color::White, shared::Color::Black] {
                let taken: String = snapshot
                    .captured_pieces
                    .by(capturer)
                    .iter()
                    .map(|piece| piece.kind.letter())
                    .collect();
                draw_text(
                    &format!("{} took: {}", capturer, taken),
                    x,
                    y,
                    18.0,
                    PANEL_TEXT,
                );
                y += line;
            }
        }

        if let Some(notice) = &state.notice {
            y += line / 2.0;
            draw_text(notice, x, y, 18.0, ORANGE);
            y += line;
        }

        y += line;
        draw_text("Chat", x, y, 20.0, PANEL_TEXT);
        y += line;

        let input_y = self.height - 40.0;
        let visible = (((input_y - y) / 18.0).max(0.0)) as usize;
        let start = state.chat_log.len().saturating_sub(visible);
        for entry in &state.chat_log[start..] {
            draw_text(
                &format!("{}: {}", entry.player, entry.message),
                x,
                y,
                16.0,
                PANEL_TEXT,
            );
            y += 18.0;
        }

        let prompt = if chat.is_active() {
            format!("> {}_", chat.text())
        } else if state.disconnected.is_some() {
            "Disconnected, R to reconnect".to_string()
        } else {
            "Enter to chat, F5 twice to reset".to_string()
        };
        draw_text(&prompt, x, input_y, 16.0, GRAY);
    }

    fn draw_game_over(&self, winner: shared::Color, layout: &BoardLayout) {
        draw_rectangle(
            layout.origin_x,
            layout.origin_y + layout.board_size() / 2.0 - 40.0,
            layout.board_size(),
            80.0,
            Color::new(0.0, 0.0, 0.0, 0.7),
        );
        self.draw_centered(
            &format!("{} wins! Press F5 twice for a new game", winner),
            layout,
            28.0,
        );
    }

    fn draw_centered(&self, text: &str, layout: &BoardLayout, font_size: f32) {
        let dims = measure_text(text, None, font_size as u16, 1.0);
        draw_text(
            text,
            layout.origin_x + (layout.board_size() - dims.width) / 2.0,
            layout.origin_y + layout.board_size() / 2.0 + dims.offset_y / 2.0,
            font_size,
            WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(flipped: bool) -> BoardLayout {
        BoardLayout {
            origin_x: 10.0,
            origin_y: 20.0,
            square_size: 50.0,
            flipped,
        }
    }

    #[test]
    fn test_white_perspective() {
        let layout = layout(false);
        assert_eq!(layout.square_at(10.0, 20.0), Some(Square::new(0, 0)));
        assert_eq!(layout.square_at(409.0, 419.0), Some(Square::new(7, 7)));
        assert_eq!(layout.square_origin(Square::new(6, 4)), (210.0, 320.0));
    }

    #[test]
    fn test_black_perspective_is_rotated() {
        let layout = layout(true);
        assert_eq!(layout.square_at(10.0, 20.0), Some(Square::new(7, 7)));
        assert_eq!(layout.square_origin(Square::new(0, 0)), (360.0, 370.0));
    }

    #[test]
    fn test_clicks_outside_board() {
        let layout = layout(false);
        assert_eq!(layout.square_at(5.0, 30.0), None);
        assert_eq!(layout.square_at(100.0, 420.0), None);
        assert_eq!(layout.square_at(410.0, 100.0), None);
    }

    #[test]
    fn test_origin_and_hit_test_agree() {
        for flipped in [false, true] {
            let layout = layout(flipped);
            for square in Square::all() {
                let (x, y) = layout.square_origin(square);
                assert_eq!(layout.square_at(x + 1.0, y + 1.0), Some(square));
            }
        }
    }

    #[test]
    fn test_fit_leaves_room_for_panel() {
        let layout = BoardLayout::fit(900.0, 640.0, 260.0, false);
        assert_eq!(layout.square_size, 75.0);
        assert!(layout.origin_x + layout.board_size() <= 900.0 - 260.0);
    }
}
