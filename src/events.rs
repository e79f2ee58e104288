// Sync events delivered to subscribers in subscription order

use tokio::sync::mpsc;

use crate::client_state::Stall;
use crate::roster::PlayerId;
use crate::TickNumber;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    MatchStarted {
        player_count: usize,
        delay_ticks: TickNumber,
    },
    PlayerLost(PlayerId),
    TickResolved(TickNumber),
    Stalled(Stall),
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber, first subscriber first.
    /// Subscribers whose receiver was dropped are forgotten.
    pub fn publish(&mut self, event: SyncEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
