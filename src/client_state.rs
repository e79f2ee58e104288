// Client role: sparse input buffer drained in tick order behind a fixed delay

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::fields;
use crate::input::TickInput;
use crate::protocol::{record_size, ClientTickMessage, InputBlock, ServerTickMessage};
use crate::roster::{PlayerId, Roster};
use crate::scheduler::PlayoutDelay;
use crate::TickNumber;

/// All players' inputs for one consumed tick
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTick<I> {
    pub tick: TickNumber,
    pub inputs: BTreeMap<PlayerId, I>,
}

/// Expected tick was missing inside the consumption window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    pub tick: TickNumber,
    pub horizon: TickNumber,
}

/// Result of one drain call
#[derive(Debug, Clone, PartialEq)]
pub struct Drained<I> {
    pub ticks: Vec<ResolvedTick<I>>,
    pub stall: Option<Stall>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub drained: u64,
    pub stalls: u64,
}

#[derive(Debug, Clone)]
pub struct ClientTickState<I> {
    roster: Roster,
    delay: PlayoutDelay,
    local_tick: TickNumber,
    next_tick_to_consume: TickNumber,
    buffer: BTreeMap<TickNumber, InputBlock<I>>,
    /// Ticks to acknowledge on the next outgoing message
    pending_acks: BTreeSet<TickNumber>,
    stats: DrainStats,
}

impl<I: TickInput> ClientTickState<I> {
    pub fn new(roster: Roster, delay: PlayoutDelay) -> Self {
        Self {
            roster,
            delay,
            local_tick: 0,
            next_tick_to_consume: 0,
            buffer: BTreeMap::new(),
            pending_acks: BTreeSet::new(),
            stats: DrainStats::default(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn local_tick(&self) -> TickNumber {
        self.local_tick
    }

    pub fn next_tick_to_consume(&self) -> TickNumber {
        self.next_tick_to_consume
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_buffered(&self, tick: TickNumber) -> bool {
        self.buffer.contains_key(&tick)
    }

    pub fn pending_acks(&self) -> &BTreeSet<TickNumber> {
        &self.pending_acks
    }

    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    pub fn advance_tick(&mut self) {
        self.local_tick += 1;
    }

    /// Store a block unless the tick is already known. Returns true when
    /// the block was newly inserted.
    ///
    /// A tick below the cursor was consumed already; its resend means the
    /// server missed the acknowledgement, so it is acknowledged again.
    pub fn insert(&mut self, tick: TickNumber, block: InputBlock<I>) -> bool {
        if block.len() != self.roster.len() {
            warn!(
                { fields::TICK } = tick,
                { fields::PLAYER_COUNT } = self.roster.len(),
                block_len = block.len(),
                "Input block size mismatch, record dropped"
            );
            return false;
        }
        if tick < self.next_tick_to_consume {
            self.pending_acks.insert(tick);
            return false;
        }
        if self.buffer.contains_key(&tick) {
            return false;
        }
        self.buffer.insert(tick, block);
        self.pending_acks.insert(tick);
        true
    }

    /// Insert every record of a server message. Returns the number of newly
    /// inserted ticks.
    pub fn receive(&mut self, message: ServerTickMessage<I>) -> usize {
        let record_count = message.records.len();
        let mut inserted = 0;
        for record in message.records {
            if self.insert(record.tick, record.block) {
                inserted += 1;
            }
        }
        trace!(
            { fields::RECORD_COUNT } = record_count,
            { fields::INSERTED_COUNT } = inserted,
            "Server message buffered"
        );
        inserted
    }

    /// Decode and buffer a raw server message
    pub fn handle_server_bytes(&mut self, data: &[u8]) -> Result<usize> {
        let player_count = self.roster.len();
        let message = ServerTickMessage::decode(data, player_count).map_err(|e| {
            debug!(
                { fields::PACKET_SIZE } = data.len(),
                { fields::RECORD_SIZE } = record_size::<I>(player_count),
                "Undecodable server message"
            );
            e
        })?;
        Ok(self.receive(message))
    }

    pub fn take_acks(&mut self) -> Vec<TickNumber> {
        std::mem::take(&mut self.pending_acks).into_iter().collect()
    }

    /// Outgoing message for this tick: local input plus every pending ack
    pub fn build_message(&mut self, input: I) -> ClientTickMessage<I> {
        ClientTickMessage::new(input, self.take_acks())
    }

    /// Highest tick that may be consumed at the current local tick
    pub fn max_next_tick_to_consume(&self) -> Option<TickNumber> {
        self.delay.horizon(self.local_tick)
    }

    /// Consume buffered ticks in order up to the delay horizon, stopping at
    /// the first gap.
    pub fn drain(&mut self) -> Drained<I> {
        let mut drained = Drained {
            ticks: Vec::new(),
            stall: None,
        };
        let Some(horizon) = self.max_next_tick_to_consume() else {
            return drained;
        };

        while self.next_tick_to_consume <= horizon {
            let tick = self.next_tick_to_consume;
            let Some(block) = self.buffer.remove(&tick) else {
                warn!(
                    { fields::NEXT_TICK } = tick,
                    { fields::HORIZON } = horizon,
                    { fields::LOCAL_TICK } = self.local_tick,
                    "Input buffer stalled, waiting for server"
                );
                self.stats.stalls += 1;
                drained.stall = Some(Stall { tick, horizon });
                break;
            };
            let inputs = self.roster.iter().zip(block).collect();
            drained.ticks.push(ResolvedTick { tick, inputs });
            self.next_tick_to_consume += 1;
        }

        self.stats.drained += drained.ticks.len() as u64;
        if !drained.ticks.is_empty() {
            debug!(
                { fields::DRAINED_COUNT } = drained.ticks.len(),
                { fields::NEXT_TICK } = self.next_tick_to_consume,
                { fields::LOCAL_TICK } = self.local_tick,
                "Ticks consumed"
            );
        }
        drained
    }

    /// Back to the match-start state, as after a reconnect
    pub fn reset(&mut self) {
        self.local_tick = 0;
        self.next_tick_to_consume = 0;
        self.buffer.clear();
        self.pending_acks.clear();
        self.stats = DrainStats::default();
    }
}
