//! # Chess Client Library
//!
//! This library provides the graphical client for the two-player networked
//! chess game. It renders the board, turns clicks into move proposals and
//! shows whatever the server last broadcast.
//!
//! ## Architecture Overview
//!
//! The server is authoritative. The client never applies a move locally: it
//! proposes one, and the board only changes when the next snapshot arrives.
//! What the client does predict is which moves are worth proposing.
//!
//! ### Predictive Highlighting
//! Selecting a piece highlights its destinations using the same rules module
//! the server validates with (`shared::rules`), so the hints cannot disagree
//! with the server's verdict.
//!
//! ### Snapshot Replacement
//! Every `GameState` packet replaces the cached session outright and drops
//! any pending selection. There is nothing to reconcile.
//!
//! ### Client-Side Game Over
//! The server keeps accepting moves after a king falls. The client locks the
//! board and announces the winner as soon as a snapshot is missing a king.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Cached snapshot, seat, selection, chat log and the click state machine.
//!
//! ### Input Module (`input`)
//! Mouse and keyboard capture, including the chat box.
//!
//! ### Network Module (`network`)
//! Background thread running the TCP connection on its own tokio runtime.
//!
//! ### Rendering Module (`rendering`)
//! Board layout, pieces, highlights and the side panel.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClickOutcome, ClientGameState};
//! use client::network::{NetworkEvent, NetworkHandle};
//! use shared::{Packet, Square};
//!
//! let mut network = NetworkHandle::connect("127.0.0.1:3000".to_string(), None)?;
//! let mut state = ClientGameState::new();
//!
//! for event in network.poll() {
//!     match event {
//!         NetworkEvent::Packet(packet) => state.apply_packet(packet),
//!         NetworkEvent::Closed { reason } => state.connection_lost(reason),
//!     }
//! }
//!
//! if let ClickOutcome::Propose { from, to } = state.click_square(Square::new(6, 4)) {
//!     network.send(Packet::Move { from, to });
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
