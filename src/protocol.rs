// Wire framing for the two tick messages
//
// Client -> Server:
// - **NB**: Input (TickInput::SIZE bytes)
// - **4B** x N: Acknowledged tick numbers (little-endian)
//
// Server -> Client, repeated once per pending tick:
// - **4B**: Tick number (little-endian)
// - **NB**: Input block (player_count x TickInput::SIZE bytes, roster order)

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, SyncError};
use crate::input::TickInput;
use crate::TickNumber;

pub const TICK_NUMBER_SIZE: usize = 4;

/// One input per player, indexed by roster order
pub type InputBlock<I> = Vec<I>;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientTickMessage<I> {
    pub input: I,
    pub acks: Vec<TickNumber>,
}

impl<I: TickInput> ClientTickMessage<I> {
    pub fn new(input: I, acks: Vec<TickNumber>) -> Self {
        Self { input, acks }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(I::SIZE + self.acks.len() * TICK_NUMBER_SIZE);
        buf.put(self.input.encode()?.as_slice());
        for tick in &self.acks {
            buf.put_u32_le(*tick);
        }
        Ok(buf.to_vec())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < I::SIZE {
            return Err(SyncError::MalformedMessage {
                len: data.len(),
                record_size: I::SIZE,
            });
        }
        let (input_bytes, mut ack_bytes) = data.split_at(I::SIZE);
        if ack_bytes.len() % TICK_NUMBER_SIZE != 0 {
            return Err(SyncError::MalformedMessage {
                len: ack_bytes.len(),
                record_size: TICK_NUMBER_SIZE,
            });
        }

        let input = I::decode(input_bytes)?;
        let mut acks = Vec::with_capacity(ack_bytes.len() / TICK_NUMBER_SIZE);
        while ack_bytes.has_remaining() {
            acks.push(ack_bytes.get_u32_le());
        }
        Ok(Self { input, acks })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord<I> {
    pub tick: TickNumber,
    pub block: InputBlock<I>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerTickMessage<I> {
    pub records: Vec<TickRecord<I>>,
}

/// Size of one server record for a match of `player_count` players
pub fn record_size<I: TickInput>(player_count: usize) -> usize {
    TICK_NUMBER_SIZE + player_count * I::SIZE
}

impl<I: TickInput> ServerTickMessage<I> {
    pub fn new(records: Vec<TickRecord<I>>) -> Self {
        Self { records }
    }

    pub fn encode(&self, player_count: usize) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.records.len() * record_size::<I>(player_count));
        for record in &self.records {
            if record.block.len() != player_count {
                return Err(SyncError::InvalidArgument(format!(
                    "block for tick {} has {} inputs, match has {} players",
                    record.tick,
                    record.block.len(),
                    player_count
                )));
            }
            buf.put_u32_le(record.tick);
            for input in &record.block {
                buf.put(input.encode()?.as_slice());
            }
        }
        Ok(buf.to_vec())
    }

    pub fn decode(data: &[u8], player_count: usize) -> Result<Self> {
        let record_size = record_size::<I>(player_count);
        if data.len() % record_size != 0 {
            return Err(SyncError::MalformedMessage {
                len: data.len(),
                record_size,
            });
        }

        let mut records = Vec::with_capacity(data.len() / record_size);
        for mut chunk in data.chunks_exact(record_size) {
            let tick = chunk.get_u32_le();
            let block = chunk
                .chunks_exact(I::SIZE)
                .map(I::decode)
                .collect::<Result<InputBlock<I>>>()?;
            records.push(TickRecord { tick, block });
        }
        Ok(Self { records })
    }
}
