// A peer plays the server role, the client role, or both (listen-server host)

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::client_state::{ClientTickState, ResolvedTick};
use crate::error::{Result, SyncError};
use crate::events::{EventBus, SyncEvent};
use crate::fields;
use crate::input::TickInput;
use crate::roster::{PlayerId, Roster};
use crate::scheduler::PlayoutDelay;
use crate::server_state::ServerTickState;
use crate::transport::{Datagram, Endpoint, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Dedicated server, no local player
    Server,
    /// Remote player
    Client(PlayerId),
    /// Server with a local player
    Host(PlayerId),
}

impl Role {
    pub fn local_player(&self) -> Option<PlayerId> {
        match self {
            Role::Server => None,
            Role::Client(player_id) | Role::Host(player_id) => Some(*player_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client(_) => "client",
            Role::Host(_) => "host",
        }
    }
}

pub struct Peer<I> {
    role: Role,
    delay: PlayoutDelay,
    player_count: usize,
    server: Option<ServerTickState<I>>,
    client: Option<ClientTickState<I>>,
    events: EventBus,
    started: bool,
}

impl<I: TickInput> Peer<I> {
    pub fn new(role: Role, roster: Roster, delay: PlayoutDelay) -> Result<Self> {
        if let Some(player_id) = role.local_player() {
            roster.index_of(player_id)?;
        }
        let server = matches!(role, Role::Server | Role::Host(_))
            .then(|| ServerTickState::new(roster.clone()));
        let client = matches!(role, Role::Client(_) | Role::Host(_))
            .then(|| ClientTickState::new(roster.clone(), delay));

        Ok(Self {
            role,
            delay,
            player_count: roster.len(),
            server,
            client,
            events: EventBus::new(),
            started: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn server(&self) -> Result<&ServerTickState<I>> {
        self.server.as_ref().ok_or(SyncError::RoleNotPlayed("server"))
    }

    pub fn client(&self) -> Result<&ClientTickState<I>> {
        self.client.as_ref().ok_or(SyncError::RoleNotPlayed("client"))
    }

    /// Apply one inbound message. Errors concern this message only.
    pub fn handle_datagram(&mut self, datagram: &Datagram) -> Result<()> {
        match datagram.from {
            Endpoint::Player(player_id) => self
                .server
                .as_mut()
                .ok_or(SyncError::RoleNotPlayed("server"))?
                .handle_client_bytes(player_id, &datagram.data),
            Endpoint::Server => self
                .client
                .as_mut()
                .ok_or(SyncError::RoleNotPlayed("client"))?
                .handle_server_bytes(&datagram.data)
                .map(|_| ()),
        }
    }

    /// One local tick: apply arrivals, send the local input with pending
    /// acknowledgements, finalize the server tick, then consume whatever is
    /// safe to consume. A server-only peer ignores `input`.
    pub fn step(
        &mut self,
        input: I,
        transport: &mut impl Transport,
        now: Instant,
    ) -> Result<Vec<ResolvedTick<I>>> {
        let span = tracing::info_span!(
            "peer",
            { fields::ROLE } = self.role.name(),
            { fields::PEER } = %transport.local(),
        );
        let _enter = span.enter();

        if !self.started {
            self.started = true;
            info!(
                { fields::PLAYER_COUNT } = self.player_count,
                { fields::DELAY_TICKS } = self.delay.ticks(),
                "Match started"
            );
            self.events.publish(SyncEvent::MatchStarted {
                player_count: self.player_count,
                delay_ticks: self.delay.ticks(),
            });
        }

        for datagram in transport.poll(now) {
            if let Err(e) = self.handle_datagram(&datagram) {
                warn!(
                    { fields::PEER } = %datagram.from,
                    { fields::PACKET_SIZE } = datagram.data.len(),
                    { fields::ERROR } = %e,
                    "Dropped incoming message"
                );
            }
        }

        if let (Some(client), Some(player_id)) = (self.client.as_mut(), self.role.local_player()) {
            let message = client.build_message(input);
            match self.server.as_mut() {
                Some(server) => server.apply_client_message(player_id, message)?,
                None => {
                    let data = message.encode()?;
                    if !transport.send(Endpoint::Server, data) {
                        debug!({ fields::REASON } = "server unreachable", "Input not sent");
                    }
                }
            }
        }

        if let Some(server) = self.server.as_mut() {
            for output in server.tick()? {
                if Some(output.player_id) == self.role.local_player() {
                    if let Some(client) = self.client.as_mut() {
                        client.receive(output.message);
                    }
                    continue;
                }
                let data = output.message.encode(self.player_count)?;
                trace!(
                    { fields::PLAYER_ID } = %output.player_id,
                    { fields::RECORD_COUNT } = output.message.records.len(),
                    { fields::PACKET_SIZE } = data.len(),
                    "Sending tick records"
                );
                if !transport.send(Endpoint::Player(output.player_id), data) {
                    debug!(
                        { fields::PLAYER_ID } = %output.player_id,
                        { fields::REASON } = "player unreachable",
                        "Tick records not sent"
                    );
                }
            }
        }

        let Some(client) = self.client.as_mut() else {
            return Ok(Vec::new());
        };
        let drained = client.drain();
        client.advance_tick();
        if let Some(stall) = drained.stall {
            self.events.publish(SyncEvent::Stalled(stall));
        }
        for resolved in &drained.ticks {
            self.events.publish(SyncEvent::TickResolved(resolved.tick));
        }
        Ok(drained.ticks)
    }

    /// The transport reported a player gone. Only meaningful for the server role.
    pub fn player_lost(&mut self, player_id: PlayerId) -> Result<()> {
        self.server
            .as_mut()
            .ok_or(SyncError::RoleNotPlayed("server"))?
            .peer_lost(player_id)?;
        self.events.publish(SyncEvent::PlayerLost(player_id));
        Ok(())
    }

    /// Drop all client-side progress, as after losing the server
    pub fn reset_client(&mut self) -> Result<()> {
        self.client
            .as_mut()
            .ok_or(SyncError::RoleNotPlayed("client"))?
            .reset();
        Ok(())
    }
}
