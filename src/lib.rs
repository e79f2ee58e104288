//! Tick synchronization for a multiplayer light-cycle game.
//!
//! Clients send their input for every tick to the server. The server freezes
//! the latest input of every player into one block per tick and resends each
//! block to each client until that client acknowledges it. Clients buffer the
//! blocks and consume them in tick order, a fixed number of ticks behind their
//! own clock, so every participant applies the same inputs to the same tick.

pub mod client_state;
pub mod config;
pub mod error;
pub mod events;
pub mod fields;
pub mod input;
pub mod logger;
pub mod peer;
pub mod protocol;
pub mod roster;
pub mod scheduler;
pub mod server_state;
pub mod session;
pub mod transport;

/// Per-peer simulation step counter
pub type TickNumber = u32;

pub use client_state::{ClientTickState, Drained, ResolvedTick, Stall};
pub use error::{Result, SyncError};
pub use events::{EventBus, SyncEvent};
pub use input::{SnakeInput, Steer, TickInput, SIZE_OF_INPUT};
pub use peer::{Peer, Role};
pub use protocol::{ClientTickMessage, InputBlock, ServerTickMessage, TickRecord};
pub use roster::{PlayerId, Roster};
pub use scheduler::{LagSimulator, PlayoutDelay};
pub use server_state::{PlayerOutput, ServerTickState};
pub use transport::{ChannelTransport, Datagram, Endpoint, Transport};
