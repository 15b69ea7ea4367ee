//! Shared data model for the kickcan authority and its observers.
//!
//! Everything that crosses the wire lives here: generational ids, transforms,
//! discrete states, intents, confirmed events and snapshots.

#![forbid(unsafe_code)]

mod command;
mod event;
mod ids;
mod math;
mod snapshot;
mod state;
mod types;
pub mod wire;

pub use crate::command::*;
pub use crate::event::*;
pub use crate::ids::*;
pub use crate::math::*;
pub use crate::snapshot::*;
pub use crate::state::*;
pub use crate::types::*;
