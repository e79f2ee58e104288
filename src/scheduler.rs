// Playout delay and artificial lag for testing over a perfect transport

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::LagConfig;
use crate::fields;
use crate::TickNumber;

/// Fixed number of ticks a client stays behind its own clock before it
/// consumes a tick. Chosen once per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayoutDelay {
    ticks: TickNumber,
}

impl PlayoutDelay {
    pub fn new(ticks: TickNumber) -> Self {
        Self { ticks }
    }

    /// Smallest delay covering `jitter` at the given tick interval (at least one tick)
    pub fn from_jitter(jitter: Duration, tick_interval: Duration) -> Self {
        let tick_nanos = tick_interval.as_nanos().max(1);
        let ticks = jitter.as_nanos().div_ceil(tick_nanos).max(1);
        Self {
            ticks: TickNumber::try_from(ticks).unwrap_or(TickNumber::MAX),
        }
    }

    pub fn ticks(&self) -> TickNumber {
        self.ticks
    }

    /// `local_tick - delay - 1`, or None while nothing may be consumed yet
    pub fn horizon(&self, local_tick: TickNumber) -> Option<TickNumber> {
        local_tick.checked_sub(self.ticks.checked_add(1)?)
    }
}

#[derive(Debug)]
struct Deferred<M> {
    release_at: Instant,
    seq: u64,
    message: M,
}

impl<M> PartialEq for Deferred<M> {
    fn eq(&self, other: &Self) -> bool {
        self.release_at == other.release_at && self.seq == other.seq
    }
}

impl<M> Eq for Deferred<M> {}

impl<M> PartialOrd for Deferred<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for Deferred<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.release_at, self.seq).cmp(&(other.release_at, other.seq))
    }
}

/// Holds messages back for a random delay and drops a share of them.
/// Messages are never modified.
#[derive(Debug)]
pub struct LagSimulator<M> {
    min_delay: Duration,
    max_delay: Duration,
    loss_rate: f64,
    rng: StdRng,
    queue: BinaryHeap<Reverse<Deferred<M>>>,
    next_seq: u64,
    dropped: u64,
}

impl<M> LagSimulator<M> {
    pub fn new(config: &LagConfig, seed: u64) -> Self {
        let min_delay = Duration::from_millis(config.min_delay_ms);
        let max_delay = Duration::from_millis(config.max_delay_ms.max(config.min_delay_ms));
        Self {
            min_delay,
            max_delay,
            loss_rate: config.loss_rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            next_seq: 0,
            dropped: 0,
        }
    }

    /// Queue a message for delayed release. Returns false if it was lost.
    pub fn submit(&mut self, message: M, now: Instant) -> bool {
        if self.loss_rate > 0.0 && self.rng.gen_bool(self.loss_rate) {
            self.dropped += 1;
            trace!(dropped = self.dropped, "Simulated packet loss");
            return false;
        }

        let delay = if self.max_delay > self.min_delay {
            self.rng.gen_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        trace!(
            { fields::DELAY_MS } = delay.as_millis() as u64,
            { fields::QUEUE_SIZE } = self.queue.len(),
            "Message deferred"
        );

        self.queue.push(Reverse(Deferred {
            release_at: now + delay,
            seq: self.next_seq,
            message,
        }));
        self.next_seq += 1;
        true
    }

    /// Every message whose release time has passed, earliest first
    pub fn release_due(&mut self, now: Instant) -> Vec<M> {
        let mut released = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.release_at > now {
                break;
            }
            if let Some(Reverse(deferred)) = self.queue.pop() {
                released.push(deferred.message);
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lag(min_delay_ms: u64, max_delay_ms: u64, loss_rate: f64) -> LagConfig {
        LagConfig {
            enabled: true,
            min_delay_ms,
            max_delay_ms,
            loss_rate,
        }
    }

    #[test]
    fn test_horizon() {
        let delay = PlayoutDelay::new(2);
        assert_eq!(delay.horizon(0), None);
        assert_eq!(delay.horizon(2), None);
        assert_eq!(delay.horizon(3), Some(0));
        assert_eq!(delay.horizon(10), Some(7));
        assert_eq!(PlayoutDelay::new(0).horizon(1), Some(0));
        assert_eq!(PlayoutDelay::new(TickNumber::MAX).horizon(5), None);
    }

    #[test]
    fn test_delay_from_jitter() {
        let tick = Duration::from_micros(16_667);
        assert_eq!(PlayoutDelay::from_jitter(Duration::ZERO, tick).ticks(), 1);
        assert_eq!(
            PlayoutDelay::from_jitter(Duration::from_millis(16), tick).ticks(),
            1
        );
        assert_eq!(
            PlayoutDelay::from_jitter(Duration::from_millis(40), tick).ticks(),
            3
        );
    }

    #[test]
    fn test_fixed_delay_release() {
        let mut sim = LagSimulator::new(&lag(50, 50, 0.0), 1);
        let start = Instant::now();
        assert!(sim.submit("a", start));
        assert!(sim.submit("b", start + Duration::from_millis(10)));

        assert!(sim.release_due(start + Duration::from_millis(49)).is_empty());
        assert_eq!(sim.release_due(start + Duration::from_millis(50)), vec!["a"]);
        assert_eq!(sim.len(), 1);
        assert_eq!(sim.release_due(start + Duration::from_millis(100)), vec!["b"]);
        assert!(sim.is_empty());
    }

    #[test]
    fn test_release_in_time_order() {
        let mut sim = LagSimulator::new(&lag(30, 30, 0.0), 7);
        let start = Instant::now();
        // submitted latest-first, so release order is the reverse of submission
        for i in (0..10u64).rev() {
            sim.submit(i, start + Duration::from_millis(i * 5));
        }
        sim.submit(100, start);

        assert!(sim.release_due(start + Duration::from_millis(29)).is_empty());
        assert_eq!(sim.release_due(start + Duration::from_millis(30)), vec![0, 100]);
        assert_eq!(
            sim.release_due(start + Duration::from_millis(42)),
            vec![1, 2]
        );
        assert_eq!(
            sim.release_due(start + Duration::from_secs(1)),
            (3..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_random_delays_release_in_time_order() {
        let start = Instant::now();
        let filled = || {
            let mut sim = LagSimulator::new(&lag(0, 200, 0.0), 11);
            for i in 0..100 {
                sim.submit(i, start);
            }
            sim
        };

        // releasing millisecond by millisecond fixes the time order
        let mut stepped = filled();
        let mut in_time_order = Vec::new();
        for ms in 0..=200 {
            in_time_order.extend(stepped.release_due(start + Duration::from_millis(ms)));
        }
        assert!(stepped.is_empty());
        assert_eq!(in_time_order.len(), 100);
        assert_ne!(in_time_order, (0..100).collect::<Vec<_>>());

        let mut at_once = filled();
        assert_eq!(
            at_once.release_due(start + Duration::from_secs(1)),
            in_time_order
        );
    }

    #[test]
    fn test_zero_delay_passes_through() {
        let mut sim = LagSimulator::new(&lag(0, 0, 0.0), 3);
        let now = Instant::now();
        sim.submit(vec![1u8, 2, 3], now);
        assert_eq!(sim.release_due(now), vec![vec![1u8, 2, 3]]);
    }

    #[test]
    fn test_loss() {
        let mut all_lost = LagSimulator::new(&lag(0, 0, 1.0), 5);
        let now = Instant::now();
        assert!(!all_lost.submit(1, now));
        assert!(all_lost.release_due(now).is_empty());
        assert_eq!(all_lost.dropped(), 1);

        let mut some_lost = LagSimulator::new(&lag(0, 0, 0.3), 5);
        let delivered = (0..1000).filter(|i| some_lost.submit(*i, now)).count();
        assert!(delivered > 500 && delivered < 900, "delivered {}", delivered);
        assert_eq!(some_lost.dropped() as usize, 1000 - delivered);
    }
}
