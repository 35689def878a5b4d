//! Code shared by the chess server and its clients.
//!
//! The legality engine in [`rules`] is the single definition of how pieces
//! move. The server runs it to accept or reject proposals; clients run the
//! same functions to highlight destinations before anything is sent.

pub mod board;
pub mod codec;
pub mod protocol;
pub mod rules;

pub use board::{Board, Color, Piece, PieceKind, Square, BOARD_SIZE};
pub use codec::{encode_frame, read_packet, write_packet, CodecError, MAX_FRAME_LEN};
pub use protocol::{
    CapturedPieces, GameSnapshot, MoveRecord, MoveRejection, Packet, Players, Role, SeatToken,
    PROTOCOL_VERSION,
};
pub use rules::{is_legal, legal_destinations};

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 3000;
