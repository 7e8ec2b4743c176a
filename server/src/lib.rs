//! # Room Server Library
//!
//! Authoritative simulation and state replication for a small real-time room.
//! The server holds the only true copy of every participant, advances it on a
//! fixed tick and streams field-level changes to every connected client.
//!
//! ## Data Flow
//!
//! participant input → connection task decodes → [`intent::IntentBuffer`]
//! (overwrite, no queue) → [`game::Simulation`] reads one consistent copy of
//! all intents and writes through [`store::StateStore`] → the store flushes a
//! coalesced [`shared::StateDiff`] → [`network::Server`] broadcasts the same
//! encoded bytes to every session.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Admission against the room capacity, identity assignment (1-based, in join
//! order, never reused) and spawn placement.
//!
//! ### Intent Module (`intent`)
//! Last-write-wins input slots, validated on write. The only state touched
//! both by connection tasks and by the tick.
//!
//! ### Store Module (`store`)
//! The participant map plus per-field change tracking; produces diffs and full
//! snapshots through the shared field-descriptor table.
//!
//! ### Game Module (`game`)
//! The fixed-step simulation: x integration and action-state derivation.
//!
//! ### Room Module (`room`)
//! The four pieces above composed behind a synchronous API.
//!
//! ### Network Module (`network`)
//! TCP sessions, the single event loop that serializes join, leave and tick,
//! and broadcast.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod intent;
pub mod network;
pub mod room;
pub mod session;
pub mod store;

pub use config::{RoomConfig, ServerConfig};
pub use error::{ServerError, SessionError, SessionId};
pub use room::{JoinAck, Room};
