//! Connection registry for the chess server
//!
//! This module tracks every open connection, including:
//! - Connection lifecycle (accept, handshake, disconnect)
//! - The bounded outbound packet queue feeding each connection's writer task
//! - The I/O tasks serving each connection, so removal closes the socket
//! - Capacity enforcement
//!
//! Seats are not tracked here; the game session decides who plays and who
//! watches. The registry only knows who is connected and how to reach them.

use crate::game::ClientId;
use log::{debug, info, warn};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;

/// Packets a connection may have queued before it counts as stalled.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// Result of queueing a packet for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    /// Unknown connection, or its writer already exited
    Closed,
    /// The peer is not reading; the queue is full
    Full,
}

/// Result of a broadcast
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub stalled: Vec<ClientId>,
}

/// A single open connection
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ClientId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the TCP connection was accepted
    pub connected_at: Instant,
    /// True once the handshake has completed; only joined clients get broadcasts
    pub joined: bool,
    /// Queue drained by this connection's writer task
    sender: mpsc::Sender<Packet>,
    reader: Option<AbortHandle>,
    writer: Option<AbortHandle>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::Sender<Packet>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            joined: false,
            sender,
            reader: None,
            writer: None,
        }
    }

    /// Queues a packet for this connection without waiting.
    pub fn send(&self, packet: Packet) -> SendStatus {
        match self.sender.try_send(packet) {
            Ok(()) => SendStatus::Queued,
            Err(TrySendError::Full(_)) => SendStatus::Full,
            Err(TrySendError::Closed(_)) => SendStatus::Closed,
        }
    }
}

/// Manages all open connections
///
/// Connection ids start at 1 and are never reused, so a stale id from a
/// closed connection can never address a newer one.
pub struct ClientManager {
    /// Open connections indexed by id
    clients: HashMap<ClientId, Client>,
    /// Next id handed out
    next_client_id: ClientId,
    /// Maximum number of concurrent connections
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a freshly accepted connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::Sender<Packet>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Records the tasks serving a connection.
    ///
    /// Returns false if the client was removed before its tasks were
    /// attached; the tasks are aborted in that case.
    pub fn attach_tasks(
        &mut self,
        client_id: ClientId,
        reader: AbortHandle,
        writer: AbortHandle,
    ) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.reader = Some(reader);
                client.writer = Some(writer);
                true
            }
            None => {
                reader.abort();
                writer.abort();
                false
            }
        }
    }

    /// Removes a connection
    ///
    /// Stops the reader task and drops the outbound sender, which lets the
    /// writer task flush what is queued and close the socket. Returns true
    /// if the client was still registered.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        let Some(client) = self.clients.remove(client_id) else {
            return false;
        };
        if let Some(reader) = &client.reader {
            reader.abort();
        }
        info!(
            "Client {} disconnected after {:?}",
            client.id,
            client.connected_at.elapsed()
        );
        true
    }

    /// Removes a connection without flushing its queue.
    pub fn evict_client(&mut self, client_id: &ClientId) -> bool {
        let Some(client) = self.clients.remove(client_id) else {
            return false;
        };
        for task in [&client.reader, &client.writer].into_iter().flatten() {
            task.abort();
        }
        warn!(
            "Client {} evicted after {:?} with a full outbound queue",
            client.id,
            client.connected_at.elapsed()
        );
        true
    }

    /// Marks the handshake as complete. Returns false for unknown or already joined clients.
    pub fn mark_joined(&mut self, client_id: ClientId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if !client.joined => {
                client.joined = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_joined(&self, client_id: ClientId) -> bool {
        self.clients
            .get(&client_id)
            .map(|client| client.joined)
            .unwrap_or(false)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Queues a packet for one connection.
    pub fn send_to(&self, client_id: ClientId, packet: Packet) -> SendStatus {
        match self.clients.get(&client_id) {
            Some(client) => client.send(packet),
            None => SendStatus::Closed,
        }
    }

    /// Queues a packet for every joined connection except `exclude`.
    ///
    /// Connections whose queue is full are reported as stalled; the caller
    /// decides what to do with them.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<ClientId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (client_id, client) in &self.clients {
            if !client.joined || Some(*client_id) == exclude {
                continue;
            }
            match client.send(packet.clone()) {
                SendStatus::Queued => report.delivered += 1,
                SendStatus::Full => report.stalled.push(*client_id),
                SendStatus::Closed => {
                    debug!("Client {} is closing, skipped {}", client_id, packet.kind())
                }
            }
        }
        report
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
