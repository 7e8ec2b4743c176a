//! # Room Client Library
//!
//! Mirrors the server's participant state and draws it. The client never
//! simulates anything itself: every position and action state it shows comes
//! from the server, eased toward the latest authoritative value each frame.
//!
//! ## Frame Order
//!
//! 1. Drain [`network::NetworkEvent`]s queued by the network thread.
//! 2. Apply them through [`game::ClientGameState`] to the [`mirror::Mirror`].
//! 3. [`mirror::Mirror::interpolate`] advances every displayed position.
//! 4. Sample the keyboard; send a `Key` message if the intent changed.
//! 5. Render.
//!
//! Patches are always applied before interpolation within a frame, so the
//! interpolator never eases toward a target that is already stale.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! Applies snapshots and diffs via the shared field-descriptor table and
//! keeps the displayed position of every participant.
//!
//! ### Network Module (`network`)
//! A background thread with its own tokio runtime: TCP connection, join
//! handshake, heartbeats, and a channel of decoded packets.
//!
//! ### Input and Rendering (`input`, `rendering`, `animation`)
//! Keyboard to intent mapping, the macroquad presentation layer and the
//! action state to animation clip table.

pub mod animation;
pub mod config;
pub mod game;
pub mod input;
pub mod mirror;
pub mod network;
pub mod rendering;

pub use config::ClientConfig;
pub use game::{ClientGameState, ConnectionStatus};
pub use mirror::{Mirror, MirrorEvent};
pub use network::{ClientError, NetworkEvent, NetworkHandle};
