// In-process match: one host and remote clients over channel transports,
// driven by random bot inputs at the configured tick rate.

use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client_state::ResolvedTick;
use crate::config::Config;
use crate::fields;
use crate::input::{SnakeInput, Steer};
use crate::peer::{Peer, Role};
use crate::roster::{PlayerId, Roster};
use crate::scheduler::PlayoutDelay;
use crate::transport::{ChannelTransport, Endpoint};

/// Player hosting the match
pub const HOST_PLAYER: PlayerId = PlayerId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerReport {
    pub player_id: PlayerId,
    pub resolved: usize,
    pub stalls: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub ticks_played: u32,
    pub players: Vec<PlayerReport>,
    /// Every player resolved the same inputs for every tick they both resolved
    pub consistent: bool,
}

struct Participant {
    player_id: PlayerId,
    peer: Peer<SnakeInput>,
    transport: ChannelTransport,
    history: Vec<ResolvedTick<SnakeInput>>,
}

pub struct LocalMatch {
    participants: Vec<Participant>,
    /// Histories of players that left, kept for the consistency check
    departed: Vec<(PlayerId, Vec<ResolvedTick<SnakeInput>>)>,
    rng: StdRng,
    delay: PlayoutDelay,
    ticks_played: u32,
}

impl LocalMatch {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        ensure!(config.players >= 1, "a match needs at least one player");

        let player_ids: Vec<PlayerId> = (1..=config.players).map(PlayerId).collect();
        let roster = Roster::new(player_ids.clone())?;
        let delay = playout_delay(config);

        let endpoints: Vec<Endpoint> = player_ids
            .iter()
            .map(|player_id| {
                if *player_id == HOST_PLAYER {
                    Endpoint::Server
                } else {
                    Endpoint::Player(*player_id)
                }
            })
            .collect();
        let transports = ChannelTransport::network(&endpoints, &config.lag, config.seed);

        let mut participants = Vec::with_capacity(player_ids.len());
        for (player_id, transport) in player_ids.into_iter().zip(transports) {
            let role = if player_id == HOST_PLAYER {
                Role::Host(player_id)
            } else {
                Role::Client(player_id)
            };
            let peer = Peer::new(role, roster.clone(), delay)
                .with_context(|| format!("failed to create peer for {}", player_id))?;
            participants.push(Participant {
                player_id,
                peer,
                transport,
                history: Vec::new(),
            });
        }

        Ok(Self {
            participants,
            departed: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            delay,
            ticks_played: 0,
        })
    }

    pub fn delay(&self) -> PlayoutDelay {
        self.delay
    }

    /// Advance every participant by one local tick
    pub fn step(&mut self, now: Instant) -> anyhow::Result<()> {
        for participant in &mut self.participants {
            let input = random_input(&mut self.rng);
            let resolved = participant
                .peer
                .step(input, &mut participant.transport, now)
                .with_context(|| format!("tick step failed for {}", participant.player_id))?;
            participant.history.extend(resolved);
        }
        self.ticks_played += 1;
        Ok(())
    }

    /// Disconnect a remote player. The host keeps the slot and repeats
    /// the player's last input.
    pub fn drop_player(&mut self, player_id: PlayerId) -> anyhow::Result<()> {
        ensure!(player_id != HOST_PLAYER, "the host cannot leave its own match");
        let index = self
            .participants
            .iter()
            .position(|participant| participant.player_id == player_id)
            .with_context(|| format!("{} is not connected", player_id))?;
        let participant = self.participants.remove(index);
        self.departed.push((player_id, participant.history));

        let host = self
            .participants
            .iter_mut()
            .find(|participant| participant.player_id == HOST_PLAYER)
            .context("host is missing")?;
        host.peer.player_lost(player_id)?;
        Ok(())
    }

    pub fn history(&self, player_id: PlayerId) -> Option<&[ResolvedTick<SnakeInput>]> {
        self.participants
            .iter()
            .find(|participant| participant.player_id == player_id)
            .map(|participant| participant.history.as_slice())
    }

    pub fn report(&self) -> MatchReport {
        let histories: Vec<&[ResolvedTick<SnakeInput>]> = self
            .participants
            .iter()
            .map(|participant| participant.history.as_slice())
            .chain(self.departed.iter().map(|(_, history)| history.as_slice()))
            .collect();
        let consistent = histories.iter().all(|history| {
            histories.iter().all(|other| {
                history
                    .iter()
                    .zip(other.iter())
                    .all(|(a, b)| a == b)
            })
        });

        let players = self
            .participants
            .iter()
            .map(|participant| PlayerReport {
                player_id: participant.player_id,
                resolved: participant.history.len(),
                stalls: participant
                    .peer
                    .client()
                    .map(|client| client.stats().stalls)
                    .unwrap_or(0),
            })
            .collect();

        MatchReport {
            ticks_played: self.ticks_played,
            players,
            consistent,
        }
    }
}

fn random_input(rng: &mut StdRng) -> SnakeInput {
    let steer = match rng.gen_range(0..3) {
        0 => Steer::Straight,
        1 => Steer::Left,
        _ => Steer::Right,
    };
    SnakeInput::new(steer, rng.gen_bool(0.05))
}

/// Configured delay, raised when the simulated lag could outrun it
pub fn playout_delay(config: &Config) -> PlayoutDelay {
    let configured = PlayoutDelay::new(config.delay_ticks);
    if !config.lag.enabled {
        return configured;
    }
    let covering = PlayoutDelay::from_jitter(
        Duration::from_millis(config.lag.max_delay_ms),
        config.tick_interval(),
    );
    if covering.ticks() <= configured.ticks() {
        return configured;
    }
    info!(
        { fields::DELAY_TICKS } = covering.ticks(),
        { fields::DELAY_MS } = config.lag.max_delay_ms,
        configured = configured.ticks(),
        "Playout delay raised to cover simulated lag"
    );
    covering
}

/// Run a whole match in real time and report how it went
pub async fn run_local_match(config: &Config) -> anyhow::Result<MatchReport> {
    let mut local_match = LocalMatch::new(config).context("failed to set up match")?;
    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        { fields::PLAYER_COUNT } = config.players,
        { fields::DELAY_TICKS } = local_match.delay().ticks(),
        { fields::TICK_RATE_HZ } = config.tick_rate_hz,
        ticks = config.ticks,
        lag_enabled = config.lag.enabled,
        "Local match starting"
    );

    for _ in 0..config.ticks {
        ticker.tick().await;
        local_match.step(Instant::now())?;
        if local_match.ticks_played % config.tick_rate_hz.max(1) == 0 {
            debug!({ fields::TICK } = local_match.ticks_played, "Match progress");
        }
    }

    let report = local_match.report();
    for player in &report.players {
        info!(
            { fields::PLAYER_ID } = %player.player_id,
            resolved = player.resolved,
            stalls = player.stalls,
            "Player summary"
        );
    }
    if !report.consistent {
        warn!("Players resolved different inputs for the same tick");
    }
    Ok(report)
}
