// Match roster - canonical player ordering shared by server and clients

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Stable identifier of a match participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Players of one match, sorted once at match start.
///
/// The position of a player in this list is its index in every input block,
/// on the server and on every client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    players: Vec<PlayerId>,
}

impl Roster {
    pub fn new(mut players: Vec<PlayerId>) -> Result<Self> {
        if players.is_empty() {
            return Err(SyncError::EmptyRoster);
        }
        players.sort_unstable();
        if let Some(pair) = players.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(SyncError::DuplicatePlayer(pair[0]));
        }
        Ok(Self { players })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn index_of(&self, player: PlayerId) -> Result<usize> {
        self.players
            .binary_search(&player)
            .map_err(|_| SyncError::UnknownPlayer(player))
    }

    pub fn player_at(&self, index: usize) -> Option<PlayerId> {
        self.players.get(index).copied()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.binary_search(&player).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().copied()
    }

    pub fn as_slice(&self) -> &[PlayerId] {
        &self.players
    }
}
