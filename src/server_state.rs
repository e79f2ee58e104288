// Server role: tick ledger with per-player resend windows
//
// Every server tick the latest known input of each player is frozen into a
// ledger entry, and each player is sent every ledger entry it has not
// acknowledged yet. A player that goes silent keeps its last input.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace, warn};

use crate::error::{Result, SyncError};
use crate::fields;
use crate::input::TickInput;
use crate::protocol::{ClientTickMessage, InputBlock, ServerTickMessage, TickRecord};
use crate::roster::{PlayerId, Roster};
use crate::TickNumber;

/// Message that should be sent to a specific player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutput<I> {
    pub player_id: PlayerId,
    pub message: ServerTickMessage<I>,
}

#[derive(Debug, Clone)]
pub struct ServerTickState<I> {
    roster: Roster,
    local_tick: TickNumber,
    /// Last known input per player, roster order
    tick_inputs: InputBlock<I>,
    ledger: BTreeMap<TickNumber, InputBlock<I>>,
    /// Ticks each player has not acknowledged yet
    pending: Vec<BTreeSet<TickNumber>>,
    connected: Vec<bool>,
}

impl<I: TickInput> ServerTickState<I> {
    pub fn new(roster: Roster) -> Self {
        let player_count = roster.len();
        Self {
            roster,
            local_tick: 0,
            tick_inputs: vec![I::default(); player_count],
            ledger: BTreeMap::new(),
            pending: vec![BTreeSet::new(); player_count],
            connected: vec![true; player_count],
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Tick that the next call to `tick` will finalize
    pub fn local_tick(&self) -> TickNumber {
        self.local_tick
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn ledger_entry(&self, tick: TickNumber) -> Option<&InputBlock<I>> {
        self.ledger.get(&tick)
    }

    pub fn pending(&self, player_id: PlayerId) -> Result<&BTreeSet<TickNumber>> {
        let index = self.roster.index_of(player_id)?;
        Ok(&self.pending[index])
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.roster
            .index_of(player_id)
            .map(|index| self.connected[index])
            .unwrap_or(false)
    }

    /// Record the latest input of a player. Already finalized ticks keep
    /// whatever input they were frozen with.
    pub fn receive_input(&mut self, player_id: PlayerId, input: I) -> Result<()> {
        let index = self.roster.index_of(player_id)?;
        if !self.connected[index] {
            warn!(
                { fields::PLAYER_ID } = %player_id,
                "Input from lost player ignored"
            );
            return Ok(());
        }
        trace!(
            { fields::PLAYER_ID } = %player_id,
            { fields::PLAYER_INDEX } = index,
            ?input,
            "Player input updated"
        );
        self.tick_inputs[index] = input;
        Ok(())
    }

    /// Returns true if the tick was still pending for this player.
    /// Unknown or already acknowledged ticks are ignored.
    pub fn acknowledge(&mut self, player_id: PlayerId, tick: TickNumber) -> Result<bool> {
        let index = self.roster.index_of(player_id)?;
        Ok(self.pending[index].remove(&tick))
    }

    pub fn apply_client_message(
        &mut self,
        player_id: PlayerId,
        message: ClientTickMessage<I>,
    ) -> Result<()> {
        self.receive_input(player_id, message.input)?;
        let mut removed = 0;
        for tick in &message.acks {
            if self.acknowledge(player_id, *tick)? {
                removed += 1;
            }
        }
        trace!(
            { fields::PLAYER_ID } = %player_id,
            { fields::ACK_COUNT } = message.acks.len(),
            removed,
            "Acknowledgements applied"
        );
        Ok(())
    }

    /// Decode and apply a raw client message
    pub fn handle_client_bytes(&mut self, player_id: PlayerId, data: &[u8]) -> Result<()> {
        let message = ClientTickMessage::decode(data)?;
        self.apply_client_message(player_id, message)
    }

    /// Finalize the current tick and build one message per connected player
    /// carrying every tick that player still has pending.
    pub fn tick(&mut self) -> Result<Vec<PlayerOutput<I>>> {
        let tick = self.local_tick;

        for (index, pending) in self.pending.iter_mut().enumerate() {
            if self.connected[index] {
                pending.insert(tick);
            }
        }
        self.ledger.insert(tick, self.tick_inputs.clone());

        let mut outputs = Vec::with_capacity(self.roster.len());
        for (index, player_id) in self.roster.iter().enumerate() {
            if !self.connected[index] {
                continue;
            }
            let records = self.pending[index]
                .iter()
                .map(|pending_tick| {
                    self.ledger
                        .get(pending_tick)
                        .map(|block| TickRecord {
                            tick: *pending_tick,
                            block: block.clone(),
                        })
                        .ok_or(SyncError::MissingLedgerEntry(*pending_tick))
                })
                .collect::<Result<Vec<_>>>()?;
            outputs.push(PlayerOutput {
                player_id,
                message: ServerTickMessage::new(records),
            });
        }

        let pruned = self.prune_history();
        debug!(
            { fields::TICK } = tick,
            { fields::LEDGER_SIZE } = self.ledger.len(),
            { fields::PRUNED_COUNT } = pruned,
            outputs = outputs.len(),
            "Server tick finalized"
        );

        self.local_tick += 1;
        Ok(outputs)
    }

    /// Drop ledger entries no connected player still waits for.
    /// Returns the number of removed entries.
    pub fn prune_history(&mut self) -> usize {
        let still_needed: BTreeSet<TickNumber> = self
            .pending
            .iter()
            .zip(&self.connected)
            .filter(|(_, connected)| **connected)
            .flat_map(|(pending, _)| pending.iter().copied())
            .collect();
        let before = self.ledger.len();
        self.ledger.retain(|tick, _| still_needed.contains(tick));
        before - self.ledger.len()
    }

    /// Forget everything owed to a disconnected player. The slot stays in
    /// every input block and keeps repeating the last known input.
    pub fn peer_lost(&mut self, player_id: PlayerId) -> Result<()> {
        let index = self.roster.index_of(player_id)?;
        if !self.connected[index] {
            return Ok(());
        }
        self.connected[index] = false;
        let dropped = std::mem::take(&mut self.pending[index]).len();
        info!(
            { fields::PLAYER_ID } = %player_id,
            { fields::PENDING_COUNT } = dropped,
            "Player lost, pending acknowledgements discarded"
        );
        Ok(())
    }
}
