//! Client-side view of the game.
//!
//! The client keeps the last snapshot the server sent plus transient UI
//! state (the selected square). Nothing here is authoritative: every
//! snapshot replaces the cached one wholesale and clears any selection.

use log::{debug, info, warn};
use shared::{legal_destinations, Color, GameSnapshot, Packet, Role, SeatToken, Square};
use std::time::{Duration, Instant};

/// Chat lines kept for display.
const MAX_CHAT_LINES: usize = 200;

/// How long a first reset request waits for its confirmation.
pub const RESET_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

const RESET_CONFIRM_PROMPT: &str = "Press F5 again to reset the game for everyone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub player: String,
    pub message: String,
}

/// What a click on the board turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Selected(Square),
    Deselected,
    /// Send this move to the server.
    Propose { from: Square, to: Square },
    Refused(&'static str),
}

/// Game end as seen by the client. The server never ends a game; a missing
/// king is only used here to lock the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    InProgress,
    KingCaptured { loser: Color },
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    pub role: Option<Role>,
    pub token: Option<SeatToken>,
    pub snapshot: Option<GameSnapshot>,
    pub selected: Option<Square>,
    pub chat_log: Vec<ChatLine>,
    /// Last message worth showing to the player (rejections, refusals).
    pub notice: Option<String>,
    /// Set once the server closes the connection.
    pub disconnected: Option<String>,
    /// When an unconfirmed reset was requested.
    pub reset_armed_at: Option<Instant>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a server packet into the local view.
    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::PlayerColor { role, token } => {
                info!("Playing as {}", role);
                self.role = Some(role);
                self.token = token;
            }
            Packet::GameState(snapshot) => {
                debug!(
                    "Received game state, {} moves played, {} to move",
                    snapshot.move_history.len(),
                    snapshot.current_turn
                );
                self.snapshot = Some(snapshot);
                self.selected = None;
            }
            Packet::ChatMessage { player, message } => {
                self.chat_log.push(ChatLine { player, message });
                if self.chat_log.len() > MAX_CHAT_LINES {
                    let excess = self.chat_log.len() - MAX_CHAT_LINES;
                    self.chat_log.drain(..excess);
                }
            }
            Packet::InvalidMove { reason, message } => {
                info!("Move rejected: {:?}", reason);
                self.notice = Some(message);
                self.selected = None;
            }
            Packet::Disconnected { reason } => self.connection_lost(reason),
            other => warn!("Unexpected packet type {}", other.kind()),
        }
    }

    /// Records why the connection ended. The first reason wins.
    pub fn connection_lost(&mut self, reason: String) {
        if self.disconnected.is_some() {
            return;
        }
        warn!("Disconnected: {}", reason);
        self.notice = Some(reason.clone());
        self.disconnected = Some(reason);
        self.selected = None;
    }

    /// Forgets the connection-bound state before reconnecting. The seat
    /// token is kept so the server can hand the seat back.
    pub fn prepare_reconnect(&mut self) {
        self.role = None;
        self.snapshot = None;
        self.selected = None;
        self.disconnected = None;
        self.notice = None;
        self.reset_armed_at = None;
    }

    pub fn my_color(&self) -> Option<Color> {
        self.role.and_then(Role::color)
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.snapshot, self.my_color()) {
            (Some(snapshot), Some(color)) => snapshot.current_turn == color,
            _ => false,
        }
    }

    pub fn outcome(&self) -> GameOutcome {
        let Some(snapshot) = &self.snapshot else {
            return GameOutcome::InProgress;
        };
        for color in [Color::White, Color::Black] {
            if !snapshot.board.has_king(color) {
                return GameOutcome::KingCaptured { loser: color };
            }
        }
        GameOutcome::InProgress
    }

    /// Interprets a click on `square`.
    ///
    /// The first click picks one of our pieces, a second click on the same
    /// square drops it and a click anywhere else proposes the move. The
    /// server has the final word either way.
    pub fn click_square(&mut self, square: Square) -> ClickOutcome {
        let outcome = self.resolve_click(square);
        match outcome {
            ClickOutcome::Selected(square) => {
                self.selected = Some(square);
                self.notice = None;
            }
            ClickOutcome::Deselected | ClickOutcome::Propose { .. } => self.selected = None,
            ClickOutcome::Refused(reason) => self.notice = Some(reason.to_string()),
        }
        outcome
    }

    fn resolve_click(&self, square: Square) -> ClickOutcome {
        let Some(snapshot) = &self.snapshot else {
            return ClickOutcome::Refused("waiting for the game state");
        };
        if self.disconnected.is_some() {
            return ClickOutcome::Refused("not connected");
        }
        if let GameOutcome::KingCaptured { .. } = self.outcome() {
            return ClickOutcome::Refused("the game is over");
        }
        let Some(color) = self.my_color() else {
            return ClickOutcome::Refused("spectators cannot move pieces");
        };
        if snapshot.current_turn != color {
            return ClickOutcome::Refused("not your turn");
        }

        match self.selected {
            None => match snapshot.board.get(square) {
                Some(piece) if piece.color == color => ClickOutcome::Selected(square),
                Some(_) => ClickOutcome::Refused("that piece is not yours"),
                None => ClickOutcome::Refused("no piece on that square"),
            },
            Some(from) if from == square => ClickOutcome::Deselected,
            Some(from) => ClickOutcome::Propose { from, to: square },
        }
    }

    /// Destinations to highlight for the selected piece.
    pub fn highlighted_targets(&self) -> Vec<Square> {
        match (&self.snapshot, self.selected, self.my_color()) {
            (Some(snapshot), Some(from), Some(color)) => match snapshot.board.get(from) {
                Some(piece) if piece.color == color => legal_destinations(&snapshot.board, from),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Two-step reset: the first request only arms it, a second one within
    /// [`RESET_CONFIRM_WINDOW`] confirms. Returns true when the reset should
    /// be sent, with local selection already dropped.
    pub fn request_reset(&mut self, now: Instant) -> bool {
        if self.disconnected.is_some() {
            return false;
        }
        match self.reset_armed_at {
            Some(armed) if now.saturating_duration_since(armed) <= RESET_CONFIRM_WINDOW => {
                self.reset_armed_at = None;
                self.selected = None;
                self.notice = None;
                true
            }
            _ => {
                self.reset_armed_at = Some(now);
                self.notice = Some(RESET_CONFIRM_PROMPT.to_string());
                false
            }
        }
    }

    /// Forgets an unconfirmed reset once its window has passed.
    pub fn expire_reset_request(&mut self, now: Instant) {
        if let Some(armed) = self.reset_armed_at {
            if now.saturating_duration_since(armed) > RESET_CONFIRM_WINDOW {
                self.reset_armed_at = None;
                if self.notice.as_deref() == Some(RESET_CONFIRM_PROMPT) {
                    self.notice = None;
                }
            }
        }
    }
}
