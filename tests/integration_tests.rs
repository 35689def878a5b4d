//! Integration tests for the networked chess components
//!
//! Every test starts a real server on an ephemeral port and talks to it over
//! TCP with the same framing the client uses.

use server::network::{Server, ServerConfig, ServerMessage};
use shared::{
    read_packet, write_packet, Color, MoveRejection, Packet, PieceKind, Role, SeatToken, Square,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerConfig) -> (SocketAddr, UnboundedSender<ServerMessage>) {
    let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        server.run().await.unwrap();
    });
    (addr, shutdown)
}

/// A raw protocol-level connection
struct TestClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self { reader, writer }
    }

    /// Connects, says hello and returns the assigned role and token.
    async fn join(
        addr: SocketAddr,
        resume_token: Option<SeatToken>,
    ) -> (Self, Role, Option<SeatToken>) {
        let mut client = Self::connect(addr).await;
        client
            .send(Packet::Hello {
                client_version: PROTOCOL_VERSION,
                resume_token,
            })
            .await;

        let (role, token) = match client.recv().await {
            Packet::PlayerColor { role, token } => (role, token),
            other => panic!("expected PlayerColor, got {:?}", other),
        };
        match client.recv().await {
            Packet::GameState(_) => {}
            other => panic!("expected GameState, got {:?}", other),
        }
        (client, role, token)
    }

    async fn send(&mut self, packet: Packet) {
        assert_ok!(write_packet(&mut self.writer, &packet).await);
    }

    async fn recv(&mut self) -> Packet {
        timeout(RECV_TIMEOUT, read_packet(&mut self.reader))
            .await
            .expect("timed out waiting for packet")
            .unwrap()
            .expect("connection closed")
    }

    /// True if the server closed the connection.
    async fn closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, read_packet(&mut self.reader)).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    /// True once the server stops accepting our writes.
    async fn write_rejected(&mut self) -> bool {
        let frame = shared::encode_frame(&Packet::ResetGame).unwrap();
        for _ in 0..100 {
            if self.writer.write_all(&frame).await.is_err() {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }

    async fn propose(&mut self, from: (u8, u8), to: (u8, u8)) {
        self.send(Packet::Move {
            from: Square::new(from.0, from.1),
            to: Square::new(to.0, to.1),
        })
        .await;
    }
}

/// GAME FLOW TESTS
mod game_flow_tests {
    use super::*;

    /// Tests seat assignment order: white, black, then spectators
    #[tokio::test]
    async fn seats_are_assigned_in_arrival_order() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;

        let (_white, white_role, white_token) = TestClient::join(addr, None).await;
        let (_black, black_role, black_token) = TestClient::join(addr, None).await;
        let (_spectator, spectator_role, spectator_token) = TestClient::join(addr, None).await;

        assert_eq!(white_role, Role::Player(Color::White));
        assert_eq!(black_role, Role::Player(Color::Black));
        assert_eq!(spectator_role, Role::Spectator);
        assert!(white_token.is_some());
        assert!(black_token.is_some());
        assert_eq!(spectator_token, None);

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that an accepted move reaches every connection, spectators included
    #[tokio::test]
    async fn accepted_move_is_broadcast_to_everyone() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;
        let (mut black, _, _) = TestClient::join(addr, None).await;
        let (mut spectator, _, _) = TestClient::join(addr, None).await;

        white.propose((6, 4), (4, 4)).await;

        for client in [&mut white, &mut black, &mut spectator] {
            match client.recv().await {
                Packet::GameState(snapshot) => {
                    assert_eq!(snapshot.current_turn, Color::Black);
                    assert!(snapshot.board.is_empty(Square::new(6, 4)));
                    assert_eq!(
                        snapshot.board.get(Square::new(4, 4)).map(|p| p.kind),
                        Some(PieceKind::Pawn)
                    );
                    assert_eq!(snapshot.move_history.len(), 1);
                }
                other => panic!("expected GameState, got {:?}", other),
            }
        }

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that rejections go only to the proposer and leave the state alone
    #[tokio::test]
    async fn rejected_moves_only_reach_the_proposer() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;
        let (mut black, _, _) = TestClient::join(addr, None).await;

        // Rook onto its own king
        white.propose((7, 0), (7, 4)).await;
        assert_eq!(white.recv().await, Packet::invalid_move(MoveRejection::IllegalMove));

        // Black moving out of turn
        black.propose((1, 4), (3, 4)).await;
        assert_eq!(black.recv().await, Packet::invalid_move(MoveRejection::NotYourTurn));

        // The next thing either side sees is the result of a legal move
        white.propose((6, 4), (4, 4)).await;
        assert!(matches!(white.recv().await, Packet::GameState(_)));
        assert!(matches!(black.recv().await, Packet::GameState(_)));

        // White cannot move twice in a row
        white.propose((4, 4), (3, 4)).await;
        assert_eq!(white.recv().await, Packet::invalid_move(MoveRejection::NotYourTurn));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests a capture sequence and that reset restores the opening position
    #[tokio::test]
    async fn capture_then_reset() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;
        let (mut black, _, _) = TestClient::join(addr, None).await;

        white.propose((6, 4), (4, 4)).await;
        white.recv().await;
        black.recv().await;
        black.propose((1, 3), (3, 3)).await;
        white.recv().await;
        black.recv().await;

        // exd5
        white.propose((4, 4), (3, 3)).await;
        match black.recv().await {
            Packet::GameState(snapshot) => {
                assert_eq!(snapshot.captured_pieces.by(Color::White).len(), 1);
                assert_eq!(
                    snapshot.move_history.last().and_then(|record| record.captured),
                    Some(shared::Piece::new(PieceKind::Pawn, Color::Black))
                );
            }
            other => panic!("expected GameState, got {:?}", other),
        }
        white.recv().await;

        let (mut spectator, _, _) = TestClient::join(addr, None).await;
        spectator.send(Packet::ResetGame).await;

        for client in [&mut white, &mut black, &mut spectator] {
            match client.recv().await {
                Packet::GameState(snapshot) => {
                    assert_eq!(snapshot.board, shared::Board::initial());
                    assert_eq!(snapshot.current_turn, Color::White);
                    assert!(snapshot.move_history.is_empty());
                    assert!(snapshot.captured_pieces.is_empty());
                }
                other => panic!("expected GameState, got {:?}", other),
            }
        }

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that chat is relayed with the sender's seat label
    #[tokio::test]
    async fn chat_is_labelled_by_seat() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;
        let (mut black, _, _) = TestClient::join(addr, None).await;
        let (mut spectator, _, _) = TestClient::join(addr, None).await;

        spectator
            .send(Packet::Chat {
                message: "good luck".to_string(),
            })
            .await;

        let expected = Packet::ChatMessage {
            player: "Spectator".to_string(),
            message: "good luck".to_string(),
        };
        assert_eq!(white.recv().await, expected);
        assert_eq!(black.recv().await, expected);
        assert_eq!(spectator.recv().await, expected);

        let _ = shutdown.send(ServerMessage::Shutdown);
    }
}

/// CONNECTION LIFECYCLE TESTS
mod connection_tests {
    use super::*;

    /// Tests that a vacated seat goes to the next arrival
    #[tokio::test]
    async fn disconnect_frees_seat_for_next_connection() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (white, _, _) = TestClient::join(addr, None).await;
        let (_black, _, _) = TestClient::join(addr, None).await;

        drop(white);
        sleep(Duration::from_millis(100)).await;

        let (_newcomer, role, _) = TestClient::join(addr, None).await;
        assert_eq!(role, Role::Player(Color::White));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that a graceful goodbye also frees the seat
    #[tokio::test]
    async fn explicit_disconnect_frees_seat() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;

        white.send(Packet::Disconnect).await;
        assert!(white.closed().await);

        let (_next, role, _) = TestClient::join(addr, None).await;
        assert_eq!(role, Role::Player(Color::White));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests reclaiming a seat with its token during the grace period
    #[tokio::test]
    async fn seat_token_reclaims_reserved_seat() {
        let config = ServerConfig {
            reconnect_grace: Duration::from_secs(30),
            ..ServerConfig::default()
        };
        let (addr, shutdown) = start_server(config).await;
        let (white, _, token) = TestClient::join(addr, None).await;
        let (_black, _, _) = TestClient::join(addr, None).await;

        drop(white);
        sleep(Duration::from_millis(100)).await;

        // Without the token a newcomer only gets to watch
        let (_stranger, role, _) = TestClient::join(addr, Some(12345)).await;
        assert_eq!(role, Role::Spectator);

        let (_returning, role, new_token) = TestClient::join(addr, token).await;
        assert_eq!(role, Role::Player(Color::White));
        assert_eq!(new_token, token);

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that a protocol version mismatch is refused
    #[tokio::test]
    async fn version_mismatch_is_refused() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let mut client = TestClient::connect(addr).await;

        client
            .send(Packet::Hello {
                client_version: PROTOCOL_VERSION + 1,
                resume_token: None,
            })
            .await;

        assert!(matches!(client.recv().await, Packet::Disconnected { .. }));
        assert!(client.closed().await);

        // The refused connection never took a seat
        let (_white, role, _) = TestClient::join(addr, None).await;
        assert_eq!(role, Role::Player(Color::White));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that refused sockets are closed in both directions and never
    /// pile up past the connection cap
    #[tokio::test]
    async fn refused_connections_are_fully_closed() {
        let config = ServerConfig {
            max_clients: 1,
            ..ServerConfig::default()
        };
        let (addr, shutdown) = start_server(config).await;

        let mut refused = Vec::new();
        for _ in 0..3 {
            let mut client = TestClient::connect(addr).await;
            client
                .send(Packet::Hello {
                    client_version: PROTOCOL_VERSION + 1,
                    resume_token: None,
                })
                .await;
            assert!(matches!(client.recv().await, Packet::Disconnected { .. }));
            refused.push(client);
        }

        for client in &mut refused {
            assert!(client.closed().await);
            assert!(client.write_rejected().await);
        }

        let (_white, role, _) = TestClient::join(addr, None).await;
        assert_eq!(role, Role::Player(Color::White));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests the connection cap
    #[tokio::test]
    async fn server_full_is_refused() {
        let config = ServerConfig {
            max_clients: 1,
            ..ServerConfig::default()
        };
        let (addr, shutdown) = start_server(config).await;
        let (_first, _, _) = TestClient::join(addr, None).await;

        let mut second = TestClient::connect(addr).await;
        assert_eq!(
            second.recv().await,
            Packet::Disconnected {
                reason: "Server full".to_string()
            }
        );

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that a garbage frame drops only the offending connection
    #[tokio::test]
    async fn malformed_frame_drops_connection() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;
        let (mut white, _, _) = TestClient::join(addr, None).await;

        let mut bad = TestClient::connect(addr).await;
        let garbage = bincode::serialize(&u32::MAX).unwrap();
        assert_ok!(bad.writer.write_u32(garbage.len() as u32).await);
        assert_ok!(bad.writer.write_all(&garbage).await);
        assert!(bad.closed().await);

        white.propose((6, 0), (5, 0)).await;
        assert!(matches!(white.recv().await, Packet::GameState(_)));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }
}

/// CLIENT STATE TESTS
mod client_state_tests {
    use super::*;
    use client::game::{ClickOutcome, ClientGameState};

    /// Tests the client state machine against real server traffic
    #[tokio::test]
    async fn client_state_follows_server() {
        let (addr, shutdown) = start_server(ServerConfig::default()).await;

        let mut white = TestClient::connect(addr).await;
        white
            .send(Packet::Hello {
                client_version: PROTOCOL_VERSION,
                resume_token: None,
            })
            .await;
        let mut state = ClientGameState::new();
        state.apply_packet(white.recv().await);
        state.apply_packet(white.recv().await);
        assert!(state.is_my_turn());

        state.click_square(Square::new(6, 3));
        let ClickOutcome::Propose { from, to } = state.click_square(Square::new(4, 3)) else {
            panic!("expected a proposal");
        };
        white.send(Packet::Move { from, to }).await;
        state.apply_packet(white.recv().await);

        assert!(!state.is_my_turn());
        assert_eq!(
            state.click_square(Square::new(6, 0)),
            ClickOutcome::Refused("not your turn")
        );

        let _ = shutdown.send(ServerMessage::Shutdown);
    }
}
