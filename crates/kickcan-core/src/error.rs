use thiserror::Error;

/// Reason an intent or request was refused by the authority.
///
/// Denials never reach the requesting observer as an error; they only ever
/// show up as the absence of a confirmed change. They are returned so callers
/// and tests can see why, and logged at debug level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("item unavailable: held, retiring or not spawned")]
    ItemUnavailable,
    #[error("pickup cooldown still running")]
    PickupCooldown,
    #[error("item out of reach")]
    OutOfRange,
    #[error("requester does not hold the item")]
    NotHolder,
    #[error("action blocked: entity is mid-transition or out of play")]
    ActionBlocked,
    #[error("stale command: superseded within the same tick")]
    StaleCommand,
    #[error("unknown entity")]
    UnknownEntity,
    #[error("missing collaborator reference: {0}")]
    MissingCollaboratorReference(&'static str),
}
