use thiserror::Error;

use crate::roster::PlayerId;
use crate::TickNumber;

/// Error types for tick sync operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Input bytes could not be decoded (wrong size or unknown values)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Message length does not split into whole records
    #[error("malformed message: {len} bytes is not a multiple of record size {record_size}")]
    MalformedMessage { len: usize, record_size: usize },
    /// Player is not part of the match roster
    #[error("player {0} is not in the roster")]
    UnknownPlayer(PlayerId),
    #[error("roster must contain at least one player")]
    EmptyRoster,
    #[error("player {0} appears twice in the roster")]
    DuplicatePlayer(PlayerId),
    /// Peer was asked to do something for a role it does not play
    #[error("peer does not play the {0} role")]
    RoleNotPlayed(&'static str),
    /// Server has no ledger entry for a tick it was asked to send
    #[error("tick {0} missing from ledger")]
    MissingLedgerEntry(TickNumber),
}

pub type Result<T> = std::result::Result<T, SyncError>;
