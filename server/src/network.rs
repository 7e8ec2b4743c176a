//! Server network layer handling TCP sessions and game loop coordination

use crate::config::ServerConfig;
use crate::error::{ServerError, SessionError, SessionId};
use crate::intent::IntentBuffer;
use crate::room::Room;
use log::{debug, error, info, warn};
use shared::{
    encode_packet, read_packet, write_frame, Packet, ParticipantId, ProtocolError,
    PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Encoded packet, shared between every session it is sent to
pub type Frame = Arc<Vec<u8>>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    JoinRequest {
        session_id: SessionId,
        addr: SocketAddr,
        room: String,
        client_version: u32,
        outbound: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<Option<ParticipantId>>,
    },
    SessionClosed {
        session_id: SessionId,
    },
    Shutdown,
}

/// Main server coordinating networking and the room simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    room: Room,
    outbound: HashMap<SessionId, mpsc::UnboundedSender<Frame>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} (room '{}', capacity {}, tick {:?})",
            local_addr, config.room.name, config.room.max_participants, config.tick_interval
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            room: Room::new(config.room.clone()),
            config,
            outbound: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can be used to stop the loop from outside.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts connections and starts a handler for each
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let intents = self.room.intents();
        let client_timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut next_session_id = 1u64;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let session_id = SessionId(next_session_id);
                        next_session_id += 1;
                        debug!("Accepted connection {} from {}", session_id, addr);

                        let connection = Connection {
                            session_id,
                            addr,
                            server_tx: server_tx.clone(),
                            intents: Arc::clone(&intents),
                            client_timeout,
                        };
                        tokio::spawn(connection.run(stream));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    fn send_frame(&self, session_id: SessionId, frame: Frame) {
        if let Some(tx) = self.outbound.get(&session_id) {
            if tx.send(frame).is_err() {
                debug!("Writer for session {} already gone", session_id);
            }
        }
    }

    /// Sends the same encoded packet to every joined session
    fn broadcast_packet(&self, packet: &Packet) {
        if self.outbound.is_empty() {
            return;
        }

        match encode_packet(packet) {
            Ok(data) => {
                let frame = Arc::new(data);
                for session_id in self.outbound.keys() {
                    self.send_frame(*session_id, Arc::clone(&frame));
                }
            }
            Err(e) => error!("Failed to encode broadcast: {}", e),
        }
    }

    fn handle_join(
        &mut self,
        session_id: SessionId,
        addr: SocketAddr,
        room: String,
        client_version: u32,
        outbound: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<Option<ParticipantId>>,
    ) {
        let result = if client_version != PROTOCOL_VERSION {
            Err(format!(
                "Protocol version mismatch (server {}, client {})",
                PROTOCOL_VERSION, client_version
            ))
        } else if room != self.room.name() {
            Err(format!("Unknown room '{}'", room))
        } else {
            self.room.join(session_id, addr).map_err(|e| match e {
                SessionError::RoomFull { .. } => "Room full".to_string(),
                other => other.to_string(),
            })
        };

        let (packet, identity) = match result {
            Ok(ack) => (
                Packet::Joined {
                    identity: ack.identity,
                    snapshot: ack.snapshot,
                },
                Some(ack.identity),
            ),
            Err(reason) => {
                warn!("Rejecting session {} from {}: {}", session_id, addr, reason);
                (Packet::Rejected { reason }, None)
            }
        };

        match encode_packet(&packet) {
            Ok(data) => {
                let _ = outbound.send(Arc::new(data));
            }
            Err(e) => error!("Failed to encode join reply: {}", e),
        }

        if identity.is_some() {
            self.outbound.insert(session_id, outbound);
        }
        let _ = reply.send(identity);
    }

    fn handle_session_closed(&mut self, session_id: SessionId) {
        self.outbound.remove(&session_id);
        if let Some(identity) = self.room.leave(session_id) {
            info!("Participant {} removed, {} remaining", identity, self.room.len());
        }
    }

    /// Main server loop coordinating all operations
    ///
    /// Join, leave and tick are all handled here, one at a time, so a tick
    /// never sees the participant set change under it and every broadcast
    /// goes out right after the tick that produced it.
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::JoinRequest { session_id, addr, room, client_version, outbound, reply }) => {
                            self.handle_join(session_id, addr, room, client_version, outbound, reply);
                        }
                        Some(ServerMessage::SessionClosed { session_id }) => {
                            self.handle_session_closed(session_id);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    let diff = self.room.tick();
                    let tick = diff.tick;
                    self.broadcast_packet(&Packet::Patch(diff));

                    if tick % 200 == 0 && !self.room.is_empty() {
                        debug!("Tick {}: {} participants", tick, self.room.len());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Per-connection reader state
struct Connection {
    session_id: SessionId,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    intents: Arc<IntentBuffer>,
    client_timeout: Duration,
}

impl Connection {
    async fn run(self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", self.addr, e);
        }
        let (mut reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Frame>();
        let writer_task = tokio::spawn(write_loop(writer, out_rx, self.session_id));

        let identity = match self.await_join(&mut reader, out_tx).await {
            Some(identity) => identity,
            None => {
                // Let the writer flush a rejection before the socket closes.
                let _ = writer_task.await;
                return;
            }
        };

        self.read_loop(&mut reader, identity).await;

        let _ = self.server_tx.send(ServerMessage::SessionClosed {
            session_id: self.session_id,
        });
        let _ = writer_task.await;
    }

    async fn next_packet(&self, reader: &mut OwnedReadHalf) -> Option<Packet> {
        loop {
            match timeout(self.client_timeout, read_packet(reader)).await {
                Ok(Ok(packet)) => return Some(packet),
                Ok(Err(e)) if e.is_recoverable() => {
                    warn!("Dropping malformed message from {}: {}", self.addr, e);
                }
                Ok(Err(ProtocolError::ConnectionClosed)) => {
                    debug!("Connection {} closed by peer", self.session_id);
                    return None;
                }
                Ok(Err(e)) => {
                    warn!("Connection {} failed: {}", self.session_id, e);
                    return None;
                }
                Err(_) => {
                    warn!(
                        "Session {} timed out after {:?} of silence",
                        self.session_id, self.client_timeout
                    );
                    return None;
                }
            }
        }
    }

    async fn await_join(
        &self,
        reader: &mut OwnedReadHalf,
        outbound: mpsc::UnboundedSender<Frame>,
    ) -> Option<ParticipantId> {
        loop {
            match self.next_packet(reader).await? {
                Packet::Join {
                    room,
                    client_version,
                } => {
                    let (reply_tx, reply_rx) = oneshot::channel();
                    self.server_tx
                        .send(ServerMessage::JoinRequest {
                            session_id: self.session_id,
                            addr: self.addr,
                            room,
                            client_version,
                            outbound,
                            reply: reply_tx,
                        })
                        .ok()?;
                    return reply_rx.await.ok().flatten();
                }
                Packet::Heartbeat => {}
                other => {
                    warn!(
                        "Ignoring {:?} from {} before join",
                        other, self.addr
                    );
                }
            }
        }
    }

    async fn read_loop(&self, reader: &mut OwnedReadHalf, identity: ParticipantId) {
        while let Some(packet) = self.next_packet(reader).await {
            match packet {
                Packet::Key(intent) => {
                    if let Err(e) = self.intents.set_intent(identity, intent) {
                        warn!("Rejected input from participant {}: {}", identity, e);
                    }
                }
                Packet::Heartbeat => {}
                Packet::Leave => {
                    info!("Participant {} left", identity);
                    return;
                }
                Packet::Join { .. } => {
                    warn!("Participant {} sent a second join, ignoring", identity);
                }
                other => {
                    warn!("Unexpected packet from participant {}: {:?}", identity, other);
                }
            }
        }
    }
}

/// Drains the session's outbound queue onto the socket
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    session_id: SessionId,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!("Failed to write to session {}: {}", session_id, e);
            break;
        }
    }
}
