//! Background networking for the render loop
//!
//! The render thread must never block on the socket, so the connection lives
//! on its own OS thread running a current-thread tokio runtime. Packets from
//! the server are queued as [`NetworkEvent`]s and drained once per frame;
//! outgoing packets travel the other way through an unbounded channel.

use crate::config::ClientConfig;
use log::{debug, error, info, warn};
use shared::{encode_packet, read_packet, write_frame, Intent, Packet, ProtocolError, PROTOCOL_VERSION};
use std::thread;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("network thread is gone")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Packet(Packet),
    /// The connection ended; no further events follow.
    Closed(String),
}

pub struct NetworkHandle {
    outgoing: UnboundedSender<Packet>,
    incoming: UnboundedReceiver<NetworkEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl NetworkHandle {
    /// Starts the network thread and queues the `Join` request.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let config = config.clone();

        let thread = thread::Builder::new()
            .name("network".to_string())
            .spawn(move || network_thread(config, outgoing_rx, events_tx))?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: events_rx,
            thread: Some(thread),
        })
    }

    pub fn send(&self, packet: Packet) -> Result<(), ClientError> {
        self.outgoing
            .send(packet)
            .map_err(|_| ClientError::Disconnected)
    }

    pub fn send_intent(&self, intent: Intent) -> Result<(), ClientError> {
        self.send(Packet::Key(intent))
    }

    /// Drains everything received since the last call without blocking.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }

    /// Sends `Leave` and waits for the network thread to finish.
    pub fn shutdown(mut self) {
        let _ = self.outgoing.send(Packet::Leave);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

fn network_thread(
    config: ClientConfig,
    outgoing: UnboundedReceiver<Packet>,
    events: UnboundedSender<NetworkEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = events.send(NetworkEvent::Closed(format!("failed to start runtime: {}", e)));
            return;
        }
    };

    let reason = match runtime.block_on(run_connection(&config, outgoing, events.clone())) {
        Ok(()) => "disconnected".to_string(),
        Err(e) => e.to_string(),
    };
    info!("Connection to {} closed: {}", config.server, reason);
    let _ = events.send(NetworkEvent::Closed(reason));
}

async fn run_connection(
    config: &ClientConfig,
    mut outgoing: UnboundedReceiver<Packet>,
    events: UnboundedSender<NetworkEvent>,
) -> Result<(), ClientError> {
    let stream = TcpStream::connect(&config.server).await?;
    stream.set_nodelay(true)?;
    info!("Connected to {}", config.server);

    let (reader, mut writer) = stream.into_split();
    send_packet(
        &mut writer,
        &Packet::Join {
            room: config.room.clone(),
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    // Reads get their own task; a partially read frame must not be
    // abandoned when another branch below wins.
    let mut reader_task = tokio::spawn(read_loop(reader, events));

    let mut heartbeat = interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            result = &mut reader_task => {
                return match result {
                    Ok(result) => result,
                    Err(e) => Err(std::io::Error::other(e).into()),
                };
            }

            packet = outgoing.recv() => match packet {
                Some(Packet::Leave) | None => {
                    let _ = send_packet(&mut writer, &Packet::Leave).await;
                    reader_task.abort();
                    return Ok(());
                }
                Some(packet) => send_packet(&mut writer, &packet).await?,
            },

            _ = heartbeat.tick() => {
                send_packet(&mut writer, &Packet::Heartbeat).await?;
            }
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    events: UnboundedSender<NetworkEvent>,
) -> Result<(), ClientError> {
    loop {
        match read_packet(&mut reader).await {
            Ok(packet) => {
                let rejected = matches!(packet, Packet::Rejected { .. });
                if events.send(NetworkEvent::Packet(packet)).is_err() {
                    return Ok(());
                }
                if rejected {
                    return Ok(());
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!("Dropping undecodable message from server: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn send_packet(writer: &mut OwnedWriteHalf, packet: &Packet) -> Result<(), ClientError> {
    let data = encode_packet(packet)?;
    write_frame(writer, &data).await?;
    debug!("Sent {:?}", packet);
    Ok(())
}
