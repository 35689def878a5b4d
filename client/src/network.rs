//! Connection to the chess server.
//!
//! macroquad owns the main thread, so the socket lives on a background
//! thread with its own tokio runtime. The UI talks to it through two
//! channels: packets to send go in, [`NetworkEvent`]s come out and are
//! drained once per frame.

use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, Packet, SeatToken, PROTOCOL_VERSION};
use std::io;
use std::thread;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Something the network thread has to tell the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Packet(Packet),
    Closed { reason: String },
}

/// UI side of the connection.
pub struct NetworkHandle {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl NetworkHandle {
    /// Starts the network thread and connects to `server_addr`.
    ///
    /// Connection failures are not returned here; they arrive as a
    /// [`NetworkEvent::Closed`] on the next [`poll`](Self::poll).
    pub fn connect(server_addr: String, resume_token: Option<SeatToken>) -> io::Result<Self> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        let _ = incoming_tx.send(NetworkEvent::Closed {
                            reason: format!("network runtime failed: {}", e),
                        });
                        return;
                    }
                };

                runtime.block_on(async move {
                    info!("Connecting to {}...", server_addr);
                    let stream = match TcpStream::connect(&server_addr).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            error!("Could not connect to {}: {}", server_addr, e);
                            let _ = incoming_tx.send(NetworkEvent::Closed {
                                reason: format!("could not connect: {}", e),
                            });
                            return;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let (reader, writer) = stream.into_split();
                    run_connection(reader, writer, resume_token, outgoing_rx, incoming_tx)
                        .await;
                });
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    /// Queues a packet. Returns false once the connection is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    /// Everything that arrived since the last call.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for NetworkHandle {
    fn drop(&mut self) {
        let _ = self.outgoing.send(Packet::Disconnect);
    }
}

/// Drives one connection until either side closes it.
///
/// Sends the handshake first, then forwards queued packets to the server
/// while a separate task decodes frames coming back.
pub async fn run_connection<R, W>(
    mut reader: R,
    mut writer: W,
    resume_token: Option<SeatToken>,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let hello = Packet::Hello {
        client_version: PROTOCOL_VERSION,
        resume_token,
    };
    if let Err(e) = write_packet(&mut writer, &hello).await {
        let _ = events.send(NetworkEvent::Closed {
            reason: format!("handshake failed: {}", e),
        });
        return;
    }

    let reader_events = events.clone();
    let mut reader_task = tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    debug!("Received {}", packet.kind());
                    if reader_events.send(NetworkEvent::Packet(packet)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Server closed the connection");
                    let _ = reader_events.send(NetworkEvent::Closed {
                        reason: "connection closed by server".to_string(),
                    });
                    break;
                }
                Err(e) => {
                    warn!("Error reading from server: {}", e);
                    let _ = reader_events.send(NetworkEvent::Closed {
                        reason: format!("connection error: {}", e),
                    });
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            packet = outgoing.recv() => {
                let Some(packet) = packet else {
                    break;
                };
                let leaving = matches!(packet, Packet::Disconnect);
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    warn!("Error sending {}: {}", packet.kind(), e);
                    let _ = events.send(NetworkEvent::Closed {
                        reason: format!("connection error: {}", e),
                    });
                    break;
                }
                if leaving {
                    break;
                }
            }
            _ = &mut reader_task => {
                return;
            }
        }
    }

    reader_task.abort();
}
