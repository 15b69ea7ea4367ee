//! Authoritative core for kickcan: item ownership, discrete action states,
//! agent decisions and the safe zone, plus the observer-side replica.

mod agent;
mod authority;
mod commands;
mod config;
mod entities;
mod error;
mod locomotion;
mod outbox;
mod ownership;
mod replica;
mod safe_zone;
mod scheduler;
mod state_channel;
mod tick;
mod transform;

pub use crate::agent::*;
pub use crate::authority::*;
pub use crate::commands::*;
pub use crate::config::*;
pub use crate::entities::*;
pub use crate::error::*;
pub use crate::locomotion::*;
pub use crate::outbox::*;
pub use crate::ownership::*;
pub use crate::replica::*;
pub use crate::safe_zone::*;
pub use crate::scheduler::*;
pub use crate::state_channel::*;
pub use crate::tick::*;
pub use crate::transform::*;
