//! # Chess Server Library
//!
//! This library provides the authoritative server for the two-player networked
//! chess game. It owns the only copy of the game session, validates every move
//! proposal and broadcasts the full state to all connected parties.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server holds the board, the turn, the seat assignments and the capture
//! lists. Clients only ever see snapshots of it and can change it solely by
//! proposing moves or resets, which the server accepts or rejects.
//!
//! ### Seat Management
//! The first connection plays white, the second black and everyone after
//! that watches. A seat is freed when its holder disconnects, optionally
//! after a grace period during which the holder can reclaim it with the
//! token it was issued.
//!
//! ### Snapshot Broadcasting
//! Every accepted move and every reset ships the entire session to every
//! joined connection. There is no diffing and no per-client view.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Connection tasks only decode frames and forward them over a channel. The
//! main loop applies them one at a time, so the session never needs a lock
//! and concurrent proposals are decided by arrival order.
//!
//! ### TCP Framing
//! Each connection is a TCP stream of length-prefixed bincode packets (see
//! `shared::codec`), which gives the ordered, reliable delivery a turn-based
//! game needs.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection registry: id assignment, capacity, handshake state and the
//! outbound queue of each connection.
//!
//! ### Game Module (`game`)
//! The game session state machine: seating, move application, captures,
//! history and reset.
//!
//! ### Network Module (`network`)
//! Listener, per-connection reader and writer tasks and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("0.0.0.0:3000", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
