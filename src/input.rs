// Per-tick player input and its fixed-size binary codec

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{Result, SyncError};

/// Byte size of one encoded `SnakeInput`
pub const SIZE_OF_INPUT: usize = 2;

/// One player's control state for one tick.
///
/// Every value encodes to exactly `SIZE` bytes and decodes back to an equal
/// value. Both ends agree on `SIZE` before any message is parsed.
pub trait TickInput: Clone + Default + PartialEq + Debug {
    const SIZE: usize;

    fn encode(&self) -> Result<Vec<u8>>;

    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Steering direction of a snake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Steer {
    #[default]
    Straight = 0,
    Left = 1,
    Right = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnakeInput {
    pub steer: Steer,
    /// Ability key held this tick
    pub ability: bool,
}

impl SnakeInput {
    pub fn new(steer: Steer, ability: bool) -> Self {
        Self { steer, ability }
    }
}

impl TickInput for SnakeInput {
    const SIZE: usize = SIZE_OF_INPUT;

    fn encode(&self) -> Result<Vec<u8>> {
        let bytes =
            bincode::serialize(self).map_err(|e| SyncError::InvalidArgument(e.to_string()))?;
        if bytes.len() != Self::SIZE {
            return Err(SyncError::InvalidArgument(format!(
                "input encoded to {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(SyncError::InvalidArgument(format!(
                "input must be {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        bincode::deserialize(bytes).map_err(|e| SyncError::InvalidArgument(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let input = SnakeInput::new(Steer::Right, true);
        assert_eq!(input.encode().unwrap(), vec![0x02, 0x01]);
        assert_eq!(SnakeInput::default().encode().unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_round_trip_all_values() {
        for steer in [Steer::Straight, Steer::Left, Steer::Right] {
            for ability in [false, true] {
                let input = SnakeInput::new(steer, ability);
                let bytes = input.encode().unwrap();
                assert_eq!(bytes.len(), SnakeInput::SIZE);
                assert_eq!(SnakeInput::decode(&bytes).unwrap(), input);
            }
        }
    }

    #[test]
    fn test_decode_wrong_size() {
        assert!(matches!(
            SnakeInput::decode(&[0x01]),
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            SnakeInput::decode(&[0x01, 0x00, 0x00]),
            Err(SyncError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_unknown_values() {
        // steer 3 does not exist
        assert!(matches!(
            SnakeInput::decode(&[0x03, 0x00]),
            Err(SyncError::InvalidArgument(_))
        ));
        // bool must be 0 or 1
        assert!(matches!(
            SnakeInput::decode(&[0x01, 0x07]),
            Err(SyncError::InvalidArgument(_))
        ));
    }
}
