//! Authoritative game session: board, turn, seats and captures.
//!
//! There is exactly one session per server. It has a single meaningful state
//! (awaiting the next move); a captured king does not end anything here, the
//! session keeps accepting moves until someone resets it.

use log::{debug, info};
use shared::{
    is_legal, Board, CapturedPieces, Color, GameSnapshot, MoveRecord, MoveRejection, Piece,
    Players, Role, SeatToken, Square,
};
use std::time::{Duration, Instant};

pub type ClientId = u32;

#[derive(Debug, Clone)]
struct SeatHolder {
    client_id: ClientId,
    token: SeatToken,
    /// Set while the holder is disconnected and the seat is reserved for it.
    disconnected_at: Option<Instant>,
}

impl SeatHolder {
    fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            token: rand::random(),
            disconnected_at: None,
        }
    }

    fn is_connected_as(&self, client_id: ClientId) -> bool {
        self.client_id == client_id && self.disconnected_at.is_none()
    }
}

/// Result of seating a new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatAssignment {
    pub role: Role,
    pub token: Option<SeatToken>,
}

/// What an accepted move did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub next_turn: Color,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    board: Board,
    current_turn: Color,
    white: Option<SeatHolder>,
    black: Option<SeatHolder>,
    captured: CapturedPieces,
    move_history: Vec<MoveRecord>,
    reconnect_grace: Duration,
}

impl GameSession {
    /// Creates a fresh session. A zero `reconnect_grace` frees a seat the
    /// moment its holder disconnects.
    pub fn new(reconnect_grace: Duration) -> Self {
        Self {
            board: Board::initial(),
            current_turn: Color::White,
            white: None,
            black: None,
            captured: CapturedPieces::default(),
            move_history: Vec::new(),
            reconnect_grace,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    pub fn captured(&self) -> &CapturedPieces {
        &self.captured
    }

    pub fn move_history(&self) -> &[MoveRecord] {
        &self.move_history
    }

    fn seat(&self, color: Color) -> &Option<SeatHolder> {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn seat_mut(&mut self, color: Color) -> &mut Option<SeatHolder> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Seats a newly joined connection.
    ///
    /// A `resume_token` matching a reserved seat hands that seat back.
    /// Otherwise white is filled first, then black, and everyone after that
    /// watches.
    pub fn assign_seat(
        &mut self,
        client_id: ClientId,
        resume_token: Option<SeatToken>,
    ) -> SeatAssignment {
        if let Some(token) = resume_token {
            for color in [Color::White, Color::Black] {
                if let Some(holder) = self.seat_mut(color) {
                    if holder.token == token && holder.disconnected_at.is_some() {
                        info!(
                            "Client {} reclaimed the {} seat from client {}",
                            client_id, color, holder.client_id
                        );
                        holder.client_id = client_id;
                        holder.disconnected_at = None;
                        return SeatAssignment {
                            role: Role::Player(color),
                            token: Some(token),
                        };
                    }
                }
            }
            debug!("Client {} presented an unknown seat token", client_id);
        }

        for color in [Color::White, Color::Black] {
            let seat = self.seat_mut(color);
            if seat.is_none() {
                let holder = SeatHolder::new(client_id);
                let token = holder.token;
                *seat = Some(holder);
                info!("Client {} seated as {}", client_id, color);
                return SeatAssignment {
                    role: Role::Player(color),
                    token: Some(token),
                };
            }
        }

        info!("Client {} joined as spectator", client_id);
        SeatAssignment {
            role: Role::Spectator,
            token: None,
        }
    }

    /// Handles a disconnect. Returns the seat the client held, if any.
    pub fn release_seat(&mut self, client_id: ClientId, now: Instant) -> Option<Color> {
        let grace = self.reconnect_grace;
        for color in [Color::White, Color::Black] {
            let seat = self.seat_mut(color);
            let held = seat
                .as_ref()
                .map(|holder| holder.is_connected_as(client_id))
                .unwrap_or(false);
            if !held {
                continue;
            }

            if grace.is_zero() {
                *seat = None;
                info!("{} seat vacated by client {}", color, client_id);
            } else if let Some(holder) = seat.as_mut() {
                holder.disconnected_at = Some(now);
                info!(
                    "{} seat reserved for client {} for {:?}",
                    color, client_id, grace
                );
            }
            return Some(color);
        }
        None
    }

    /// Frees reserved seats whose grace period has run out.
    pub fn expire_reservations(&mut self, now: Instant) -> Vec<Color> {
        let grace = self.reconnect_grace;
        let mut expired = Vec::new();
        for color in [Color::White, Color::Black] {
            let seat = self.seat_mut(color);
            let lapsed = seat
                .as_ref()
                .and_then(|holder| holder.disconnected_at)
                .map(|since| now.saturating_duration_since(since) >= grace)
                .unwrap_or(false);
            if lapsed {
                *seat = None;
                expired.push(color);
            }
        }
        expired
    }

    /// Role of a connected client. Unseated and unknown clients are spectators.
    pub fn role_of(&self, client_id: ClientId) -> Role {
        for color in [Color::White, Color::Black] {
            if let Some(holder) = self.seat(color) {
                if holder.is_connected_as(client_id) {
                    return Role::Player(color);
                }
            }
        }
        Role::Spectator
    }

    /// Validates and applies a move proposal from `client_id`.
    ///
    /// On rejection the session is left untouched.
    pub fn propose_move(
        &mut self,
        client_id: ClientId,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, MoveRejection> {
        if self.role_of(client_id).color() != Some(self.current_turn) {
            return Err(MoveRejection::NotYourTurn);
        }
        if !is_legal(&self.board, self.current_turn, from, to) {
            return Err(MoveRejection::IllegalMove);
        }

        let piece = self.board.take(from).ok_or(MoveRejection::IllegalMove)?;
        let captured = self.board.place(to, piece);
        if let Some(taken) = captured {
            self.captured.record(piece.color, taken);
        }

        self.move_history.push(MoveRecord {
            from,
            to,
            piece,
            captured,
        });
        self.current_turn = self.current_turn.opponent();

        Ok(MoveOutcome {
            piece,
            captured,
            next_turn: self.current_turn,
        })
    }

    /// Restores the starting position. Seats are kept.
    pub fn reset(&mut self) {
        self.board = Board::initial();
        self.current_turn = Color::White;
        self.captured.clear();
        self.move_history.clear();
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            board: self.board.clone(),
            current_turn: self.current_turn,
            players: Players {
                white: self.white.as_ref().map(|holder| holder.client_id),
                black: self.black.as_ref().map(|holder| holder.client_id),
            },
            move_history: self.move_history.clone(),
            captured_pieces: self.captured.clone(),
        }
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
