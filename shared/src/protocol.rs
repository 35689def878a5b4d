//! Wire protocol shared by server and client.
//!
//! Every state change ships the complete [`GameSnapshot`]; there are no
//! partial updates.

use crate::board::{Board, Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bumped whenever the `Packet` layout changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Opaque secret handed to a seat holder so it can reclaim the seat after a reconnect.
pub type SeatToken = u64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Hello {
        client_version: u32,
        resume_token: Option<SeatToken>,
    },
    Move {
        from: Square,
        to: Square,
    },
    Chat {
        message: String,
    },
    ResetGame,
    Disconnect,

    // Server -> client
    PlayerColor {
        role: Role,
        token: Option<SeatToken>,
    },
    GameState(GameSnapshot),
    ChatMessage {
        player: String,
        message: String,
    },
    InvalidMove {
        reason: MoveRejection,
        message: String,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Hello { .. } => "hello",
            Packet::Move { .. } => "move",
            Packet::Chat { .. } => "chat",
            Packet::ResetGame => "reset-game",
            Packet::Disconnect => "disconnect",
            Packet::PlayerColor { .. } => "player-color",
            Packet::GameState(_) => "game-state",
            Packet::ChatMessage { .. } => "chat-message",
            Packet::InvalidMove { .. } => "invalid-move",
            Packet::Disconnected { .. } => "disconnected",
        }
    }

    pub fn invalid_move(reason: MoveRejection) -> Self {
        Packet::InvalidMove {
            reason,
            message: reason.to_string(),
        }
    }
}

/// What a connection is allowed to do at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Player(Color),
    Spectator,
}

impl Role {
    pub fn color(self) -> Option<Color> {
        match self {
            Role::Player(color) => Some(color),
            Role::Spectator => None,
        }
    }

    /// Label attached to chat lines.
    pub fn label(self) -> &'static str {
        match self {
            Role::Player(Color::White) => "White",
            Role::Player(Color::Black) => "Black",
            Role::Spectator => "Spectator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player(color) => write!(f, "{}", color),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

/// Why a move proposal was turned down.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveRejection {
    #[error("not your turn")]
    NotYourTurn,
    #[error("illegal move")]
    IllegalMove,
}

/// Connection ids currently holding each seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub white: Option<u32>,
    pub black: Option<u32>,
}

/// Pieces each side has taken, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPieces {
    pub white: Vec<Piece>,
    pub black: Vec<Piece>,
}

impl CapturedPieces {
    pub fn by(&self, capturer: Color) -> &[Piece] {
        match capturer {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn record(&mut self, capturer: Color, piece: Piece) {
        match capturer {
            Color::White => self.white.push(piece),
            Color::Black => self.black.push(piece),
        }
    }

    pub fn clear(&mut self) {
        self.white.clear();
        self.black.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_empty() && self.black.is_empty()
    }
}

/// An accepted move as kept in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
}

/// Full authoritative session state as broadcast to every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board: Board,
    pub current_turn: Color,
    pub players: Players,
    pub move_history: Vec<MoveRecord>,
    pub captured_pieces: CapturedPieces,
}
