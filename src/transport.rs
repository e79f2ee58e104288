// Transport adapter: opaque datagrams between endpoints
//
// The sync core only needs fire-and-forget sends and a way to collect what
// arrived, tagged with the sender. `ChannelTransport` wires endpoints of one
// process together over tokio channels, optionally through a lag simulator.
// Simulated lag is counted from the sender's clock, the `now` of its latest
// poll, so time spent waiting in the inbox is not added on top.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::LagConfig;
use crate::fields;
use crate::roster::PlayerId;
use crate::scheduler::LagSimulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Server,
    Player(PlayerId),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Server => write!(f, "server"),
            Endpoint::Player(player_id) => write!(f, "{}", player_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub from: Endpoint,
    pub data: Vec<u8>,
}

pub trait Transport {
    fn local(&self) -> Endpoint;

    /// Fire and forget. Returns false when the destination is gone.
    fn send(&self, to: Endpoint, data: Vec<u8>) -> bool;

    /// Send to every other endpoint, returns how many were reachable
    fn broadcast(&self, data: &[u8]) -> usize;

    /// Everything that arrived since the last poll
    fn poll(&mut self, now: Instant) -> Vec<Datagram>;
}

/// A datagram stamped with the sender's clock
#[derive(Debug)]
struct Envelope {
    sent_at: Instant,
    datagram: Datagram,
}

pub struct ChannelTransport {
    local: Endpoint,
    peers: Arc<HashMap<Endpoint, mpsc::UnboundedSender<Envelope>>>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    lag: Option<LagSimulator<Datagram>>,
    clock: Instant,
}

impl ChannelTransport {
    /// One connected transport per endpoint, in the given order. When lag is
    /// enabled every endpoint delays its own inbound traffic.
    pub fn network(endpoints: &[Endpoint], lag: &LagConfig, seed: u64) -> Vec<Self> {
        let mut senders = HashMap::with_capacity(endpoints.len());
        let mut inboxes = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(*endpoint, tx);
            inboxes.push((*endpoint, rx));
        }
        let peers = Arc::new(senders);
        let clock = Instant::now();

        inboxes
            .into_iter()
            .enumerate()
            .map(|(index, (local, inbox))| Self {
                local,
                peers: peers.clone(),
                inbox,
                lag: lag
                    .enabled
                    .then(|| LagSimulator::new(lag, seed.wrapping_add(index as u64))),
                clock,
            })
            .collect()
    }

    /// Messages held back by the lag simulator
    pub fn in_flight(&self) -> usize {
        self.lag.as_ref().map_or(0, |lag| lag.len())
    }
}

impl Transport for ChannelTransport {
    fn local(&self) -> Endpoint {
        self.local
    }

    fn send(&self, to: Endpoint, data: Vec<u8>) -> bool {
        let Some(tx) = self.peers.get(&to) else {
            return false;
        };
        let size = data.len();
        let delivered = tx
            .send(Envelope {
                sent_at: self.clock,
                datagram: Datagram {
                    from: self.local,
                    data,
                },
            })
            .is_ok();
        if !delivered {
            debug!(
                { fields::PEER } = %to,
                { fields::PACKET_SIZE } = size,
                { fields::REASON } = "destination closed",
                "Message discarded"
            );
        }
        delivered
    }

    fn broadcast(&self, data: &[u8]) -> usize {
        self.peers
            .keys()
            .filter(|endpoint| **endpoint != self.local)
            .filter(|endpoint| self.send(**endpoint, data.to_vec()))
            .count()
    }

    fn poll(&mut self, now: Instant) -> Vec<Datagram> {
        self.clock = self.clock.max(now);
        let mut arrived = Vec::new();
        while let Ok(envelope) = self.inbox.try_recv() {
            match self.lag.as_mut() {
                Some(lag) => {
                    lag.submit(envelope.datagram, envelope.sent_at);
                }
                None => arrived.push(envelope.datagram),
            }
        }
        if let Some(lag) = self.lag.as_mut() {
            arrived.extend(lag.release_due(now));
        }
        arrived
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::Server,
            Endpoint::Player(PlayerId(1)),
            Endpoint::Player(PlayerId(2)),
        ]
    }

    #[test]
    fn test_send_and_poll() {
        let mut network = ChannelTransport::network(&endpoints(), &LagConfig::default(), 0);
        let now = Instant::now();

        assert!(network[1].send(Endpoint::Server, vec![1, 2]));
        assert!(network[2].send(Endpoint::Server, vec![3]));

        let arrived = network[0].poll(now);
        assert_eq!(
            arrived,
            vec![
                Datagram {
                    from: Endpoint::Player(PlayerId(1)),
                    data: vec![1, 2]
                },
                Datagram {
                    from: Endpoint::Player(PlayerId(2)),
                    data: vec![3]
                },
            ]
        );
        assert!(network[0].poll(now).is_empty());
    }

    #[test]
    fn test_broadcast_skips_self() {
        let mut network = ChannelTransport::network(&endpoints(), &LagConfig::default(), 0);
        let now = Instant::now();
        assert_eq!(network[0].broadcast(&[9]), 2);
        assert!(network[0].poll(now).is_empty());
        assert_eq!(network[1].poll(now).len(), 1);
        assert_eq!(network[2].poll(now)[0].from, Endpoint::Server);
    }

    #[test]
    fn test_closed_destination() {
        let mut network = ChannelTransport::network(&endpoints(), &LagConfig::default(), 0);
        let gone = network.pop();
        drop(gone);
        assert!(!network[0].send(Endpoint::Player(PlayerId(2)), vec![1]));
        assert!(!network[0].send(Endpoint::Player(PlayerId(9)), vec![1]));
    }

    #[test]
    fn test_lag_holds_messages_back() {
        let lag = LagConfig {
            enabled: true,
            min_delay_ms: 30,
            max_delay_ms: 30,
            loss_rate: 0.0,
        };
        let mut network = ChannelTransport::network(&endpoints(), &lag, 0);
        let start = Instant::now();

        network[1].send(Endpoint::Server, vec![7]);
        assert!(network[0].poll(start).is_empty());
        assert_eq!(network[0].in_flight(), 1);

        let arrived = network[0].poll(start + Duration::from_millis(30));
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].data, vec![7]);
        assert_eq!(network[0].in_flight(), 0);
    }

    #[test]
    fn test_lag_counts_from_send_time() {
        let lag = LagConfig {
            enabled: true,
            min_delay_ms: 20,
            max_delay_ms: 20,
            loss_rate: 0.0,
        };
        let mut network = ChannelTransport::network(&endpoints(), &lag, 0);
        let start = Instant::now();

        assert!(network[1].poll(start).is_empty());
        network[1].send(Endpoint::Server, vec![1]);

        // first look at the inbox one tick after the send
        assert!(network[0].poll(start + Duration::from_millis(16)).is_empty());
        assert_eq!(network[0].in_flight(), 1);

        let arrived = network[0].poll(start + Duration::from_millis(20));
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].data, vec![1]);
    }

    #[test]
    fn test_sender_clock_follows_latest_poll() {
        let lag = LagConfig {
            enabled: true,
            min_delay_ms: 10,
            max_delay_ms: 10,
            loss_rate: 0.0,
        };
        let mut network = ChannelTransport::network(&endpoints(), &lag, 0);
        let start = Instant::now();

        network[2].poll(start + Duration::from_millis(50));
        // an older poll time does not move the clock back
        network[2].poll(start);
        network[2].send(Endpoint::Server, vec![2]);

        assert!(network[0].poll(start + Duration::from_millis(59)).is_empty());
        assert_eq!(network[0].poll(start + Duration::from_millis(60)).len(), 1);
    }
}
