//! Kickcan multiplayer server
//!
//! Authoritative host using Renet for networking. The simulation itself
//! lives in kickcan-core; this crate admits observers, feeds trigger edges
//! and ships confirmed results over three channels.

pub mod channels;
pub mod config;
pub mod player_manager;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;
pub mod triggers;

pub use channels::*;
pub use config::{ServerConfig, ServerConfigError};
pub use player_manager::{AddPlayerError, Player, PlayerManager};
pub use protocol::*;
pub use server::Server;
pub use session::{Outbound, Recipient, Session};
pub use transport::{ServerRunner, TransportConfig, TransportError, PROTOCOL_ID};
pub use triggers::{Aabb, TriggerVolumes};
