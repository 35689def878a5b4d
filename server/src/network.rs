//! Server network layer: TCP connections and the authoritative event loop

use crate::client_manager::{ClientManager, SendStatus, OUTBOUND_QUEUE_LEN};
use crate::game::{ClientId, GameSession};
use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, Packet, SeatToken, Square, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { client_id: ClientId, packet: Packet },
    ClientDisconnected { client_id: ClientId },
    Shutdown,
}

/// Tunables for a server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrent connections, players and spectators alike
    pub max_clients: usize,
    /// How long a disconnected player's seat stays reserved for its token
    pub reconnect_grace: Duration,
    /// How often expired seat reservations are swept
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            reconnect_grace: Duration::ZERO,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Chess server: accepts connections and owns the single game session
///
/// Connection tasks only parse frames and forward them; every session
/// mutation happens inside [`Server::run`], one message at a time.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    session: GameSession,
    sweep_interval: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            session: GameSession::new(config.reconnect_grace),
            sweep_interval: config.sweep_interval,
            server_tx,
            server_rx,
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop [`Server::run`] with [`ServerMessage::Shutdown`]
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts incoming connections
    fn spawn_listener(&mut self) -> Result<(), ServerError> {
        let listener = self
            .listener
            .take()
            .ok_or("server listener already started")?;
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not disable Nagle for {}: {}", addr, e);
                        }
                        Self::spawn_connection(stream, addr, &clients, &server_tx).await;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });

        Ok(())
    }

    /// Registers a connection and spawns its reader and writer tasks
    async fn spawn_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: &Arc<RwLock<ClientManager>>,
        server_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let (packet_tx, mut packet_rx) = mpsc::channel::<Packet>(OUTBOUND_QUEUE_LEN);

        let client_id = {
            let mut clients = clients.write().await;
            clients.add_client(addr, packet_tx)
        };

        let Some(client_id) = client_id else {
            warn!("Refusing connection from {}: server full", addr);
            let refusal = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            if let Err(e) = write_packet(&mut writer, &refusal).await {
                debug!("Failed to notify {} of refusal: {}", addr, e);
            }
            let _ = writer.shutdown().await;
            return;
        };

        // Writer: drains the outbound queue until the client is removed from the registry
        let writer_task = tokio::spawn(async move {
            while let Some(packet) = packet_rx.recv().await {
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    warn!(
                        "Failed to send {} to client {}: {}",
                        packet.kind(),
                        client_id,
                        e
                    );
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        // Reader: forwards every frame to the main loop in arrival order.
        // Aborted by the registry when the client is removed.
        let server_tx = server_tx.clone();
        let reader_task = tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(Some(packet)) => {
                        let message = ServerMessage::PacketReceived { client_id, packet };
                        if let Err(e) = server_tx.send(message) {
                            error!("Failed to send packet to main loop: {}", e);
                            return;
                        }
                    }
                    Ok(None) => {
                        debug!("Client {} closed the connection", client_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Dropping client {}: {}", client_id, e);
                        break;
                    }
                }
            }
            let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
        });

        let attached = clients.write().await.attach_tasks(
            client_id,
            reader_task.abort_handle(),
            writer_task.abort_handle(),
        );
        if !attached {
            debug!("Client {} was removed before its tasks started", client_id);
        }
    }

    async fn send_packet(&mut self, client_id: ClientId, packet: Packet) {
        let status = {
            let clients = self.clients.read().await;
            clients.send_to(client_id, packet)
        };
        match status {
            SendStatus::Queued => {}
            SendStatus::Closed => debug!("Client {} is gone, packet dropped", client_id),
            SendStatus::Full => self.evict_stalled(vec![client_id]).await,
        }
    }

    async fn broadcast_packet(&mut self, packet: Packet, exclude: Option<ClientId>) {
        let report = {
            let clients = self.clients.read().await;
            clients.broadcast(&packet, exclude)
        };
        debug!("Broadcast {} to {} clients", packet.kind(), report.delivered);
        self.evict_stalled(report.stalled).await;
    }

    /// Drops connections that stopped reading and frees their seats
    async fn evict_stalled(&mut self, stalled: Vec<ClientId>) {
        if stalled.is_empty() {
            return;
        }
        {
            let mut clients = self.clients.write().await;
            for client_id in &stalled {
                clients.evict_client(client_id);
            }
        }
        for client_id in stalled {
            if let Some(color) = self.session.release_seat(client_id, Instant::now()) {
                info!("Stalled client {} lost the {} seat", client_id, color);
            }
        }
    }

    /// Ships the full session to every joined connection
    async fn broadcast_game_state(&mut self) {
        let packet = Packet::GameState(self.session.snapshot());
        self.broadcast_packet(packet, None).await;
    }

    /// Sends a refusal and drops the connection from the registry.
    ///
    /// The writer flushes the refusal and closes the socket; the reader is
    /// stopped so nothing more is read from it.
    async fn disconnect_client(&mut self, client_id: ClientId, reason: String) {
        warn!("Disconnecting client {}: {}", client_id, reason);
        {
            let mut clients = self.clients.write().await;
            let refusal = Packet::Disconnected { reason };
            if clients.send_to(client_id, refusal) != SendStatus::Queued {
                debug!("Client {} could not be told why it was dropped", client_id);
            }
            clients.remove_client(&client_id);
        }
        self.session.release_seat(client_id, Instant::now());
    }

    /// Dispatches one inbound packet
    async fn handle_packet(&mut self, client_id: ClientId, packet: Packet) {
        if let Packet::Hello {
            client_version,
            resume_token,
        } = packet
        {
            self.handle_hello(client_id, client_version, resume_token)
                .await;
            return;
        }

        let joined = {
            let clients = self.clients.read().await;
            clients.is_joined(client_id)
        };
        if !joined {
            warn!(
                "Ignoring {} from client {} before handshake",
                packet.kind(),
                client_id
            );
            return;
        }

        match packet {
            Packet::Move { from, to } => self.handle_move(client_id, from, to).await,
            Packet::Chat { message } => {
                let player = self.session.role_of(client_id).label().to_string();
                debug!("Chat from client {} ({}): {}", client_id, player, message);
                self.broadcast_packet(Packet::ChatMessage { player, message }, None)
                    .await;
            }
            Packet::ResetGame => {
                info!("Client {} reset the game", client_id);
                self.session.reset();
                self.broadcast_game_state().await;
            }
            Packet::Disconnect => self.handle_disconnect(client_id).await,
            other => {
                warn!(
                    "Unexpected packet type {} from client {}",
                    other.kind(),
                    client_id
                );
            }
        }
    }

    /// Completes the handshake: seats the connection and sends it the current state
    async fn handle_hello(
        &mut self,
        client_id: ClientId,
        client_version: u32,
        resume_token: Option<SeatToken>,
    ) {
        if client_version != PROTOCOL_VERSION {
            let reason = format!(
                "Protocol version mismatch: server speaks {}, client sent {}",
                PROTOCOL_VERSION, client_version
            );
            self.disconnect_client(client_id, reason).await;
            return;
        }

        let joined = {
            let mut clients = self.clients.write().await;
            clients.mark_joined(client_id)
        };
        if !joined {
            warn!("Ignoring repeated or stale hello from client {}", client_id);
            return;
        }

        let assignment = self.session.assign_seat(client_id, resume_token);
        self.send_packet(
            client_id,
            Packet::PlayerColor {
                role: assignment.role,
                token: assignment.token,
            },
        )
        .await;
        let snapshot = self.session.snapshot();
        self.send_packet(client_id, Packet::GameState(snapshot)).await;
    }

    async fn handle_move(&mut self, client_id: ClientId, from: Square, to: Square) {
        let role = self.session.role_of(client_id);
        info!("Move from client {} ({}): {} -> {}", client_id, role, from, to);

        match self.session.propose_move(client_id, from, to) {
            Ok(outcome) => {
                info!("Moved {}", outcome.piece);
                if let Some(captured) = outcome.captured {
                    info!("Captured {}", captured);
                }
                info!("Next turn: {}", outcome.next_turn);
                self.broadcast_game_state().await;
            }
            Err(rejection) => {
                info!("Rejected move from client {}: {}", client_id, rejection);
                self.send_packet(client_id, Packet::invalid_move(rejection))
                    .await;
            }
        }
    }

    async fn handle_disconnect(&mut self, client_id: ClientId) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };
        if let Some(color) = self.session.release_seat(client_id, Instant::now()) {
            info!("Client {} left the {} seat", client_id, color);
        } else if removed {
            debug!("Spectator {} left", client_id);
        }
    }

    /// Main server loop: applies connection events one at a time
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_listener()?;

        let mut sweep_interval = interval(self.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { client_id, packet }) => {
                            self.handle_packet(client_id, packet).await;
                        },
                        Some(ServerMessage::ClientDisconnected { client_id }) => {
                            self.handle_disconnect(client_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sweep_interval.tick() => {
                    for color in self.session.expire_reservations(Instant::now()) {
                        info!("Reservation for the {} seat expired", color);
                    }
                },
            }
        }

        Ok(())
    }
}
