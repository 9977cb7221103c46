//! One room instance: pools, active sets and collaborators.
//!
//! A [`Room`] is the only owner of simulation state. Join/leave, input
//! delivery, the tick and the latency cycle all go through `&Room` from
//! different tasks; every structure inside is individually locked for the
//! duration of a single mutation and no gateway call is made under a lock.

mod characters;
mod projectiles;
mod runtime;
mod tick;

pub use characters::CharacterRoster;
pub use projectiles::{Advanced, Launched, ProjectileManager, Retirement};
pub use runtime::RoomRuntime;
pub use tick::{TickFailure, TickPhase, TickReport};

use crate::clock::Clock;
use crate::config::{Config, ConfigError};
use crate::entity::{EntityId, IdAllocator, Input, ProjectileSpec, RoomId, SessionId};
use crate::error::SimError;
use crate::gateway::ReplicationGateway;
use crate::pool::PoolStats;
use protocol::packets::ClientPacket;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Pool occupancy for both entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub characters: PoolStats,
    pub projectiles: PoolStats,
    pub sessions: usize,
    pub active_projectiles: usize,
}

/// What a leave tore down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub character: EntityId,
    pub retired_projectiles: Vec<EntityId>,
}

/// Outcome of one latency probe cycle.
#[derive(Debug, Default)]
pub struct ProbeReport {
    pub sent: usize,
    /// Characters whose previous probe is still within its timeout.
    pub outstanding: usize,
    pub failures: Vec<SimError>,
}

pub struct Room {
    config: Config,
    ids: IdAllocator,
    tick: AtomicU64,
    roster: CharacterRoster,
    projectiles: ProjectileManager,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn ReplicationGateway>,
}

impl Room {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn ReplicationGateway>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let spec = ProjectileSpec {
            kind: config.weapon.projectile_kind,
            velocity: config.weapon.projectile_velocity,
            max_age: config.weapon.projectile_max_age,
        };
        Ok(Self {
            roster: CharacterRoster::new(config.pool.max_characters),
            projectiles: ProjectileManager::new(config.pool.max_projectiles, spec),
            ids: IdAllocator::default(),
            tick: AtomicU64::new(0),
            config,
            clock,
            gateway,
        })
    }

    #[inline]
    pub fn id(&self) -> RoomId {
        self.config.simulation.room_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }

    pub fn projectiles(&self) -> &ProjectileManager {
        &self.projectiles
    }

    /// Number of ticks stepped so far.
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RoomStats {
        RoomStats {
            characters: self.roster.pool().stats(),
            projectiles: self.projectiles.stats(),
            sessions: self.roster.len(),
            active_projectiles: self.projectiles.active_len(),
        }
    }

    /// Spawn a character for a new session and place it with the gateway.
    pub fn join(&self, session: SessionId) -> Result<EntityId, SimError> {
        let id = self.ids.next_id();
        let spawn = self.config.character.spawn_position();
        let character = &self.config.character;
        let cooldown_ms = self.config.weapon.cooldown_ms;

        if let Err(err) = self.roster.join(session, |c| {
            c.spawn(
                id,
                session,
                spawn,
                character.velocity,
                cooldown_ms,
                character.input_buffer_capacity,
            )
        }) {
            if err.is_pool_exhausted() {
                warn!("Session {} refused: {}", session, err);
            }
            return Err(err);
        }

        if let Err(err) = self.gateway.set_user_position(session, spawn, self.id()) {
            warn!(session, entity = id, "Spawn placement rejected by gateway: {}", err);
        }
        info!(session, entity = id, "Character joined at {}", spawn);
        Ok(id)
    }

    /// Tear down a session's character and everything it still has in flight.
    pub fn leave(&self, session: SessionId) -> Result<Departure, SimError> {
        let handle = self
            .roster
            .detach(session)
            .ok_or(SimError::UnknownSession(session))?;
        let character = self.roster.pool().with(handle, |c| c.id)?;

        let mut retired_projectiles = Vec::new();
        for projectile in self.projectiles.owned_by(handle) {
            match self.projectiles.retire(projectile, self.gateway.as_ref()) {
                Ok(Some(retired)) => {
                    if let Err(err) = retired.notify {
                        warn!(session, entity = retired.id, "Projectile removal rejected: {}", err);
                    }
                    retired_projectiles.push(retired.id);
                }
                // Expired by the tick in the meantime.
                Ok(None) => {}
                Err(err) => warn!(session, "Projectile teardown failed: {}", err),
            }
        }

        // Drops buffered inputs, weapon and latency state with the slot.
        self.roster.release(handle)?;

        if let Err(err) = self.gateway.remove_user(session) {
            warn!(session, "User removal rejected by gateway: {}", err);
        }
        info!(
            session,
            entity = character,
            "Character left ({} projectiles retired)",
            retired_projectiles.len()
        );
        Ok(Departure {
            character,
            retired_projectiles,
        })
    }

    /// Queue an input for the next tick.
    pub fn enqueue_input(&self, session: SessionId, input: Input) -> Result<(), SimError> {
        let handle = self
            .roster
            .handle_of(session)
            .ok_or(SimError::UnknownSession(session))?;
        let evicted = self.roster.pool().with_mut(handle, |c| c.inputs.push(input))?;
        if let Some(dropped) = evicted {
            trace!(session, "Input buffer full, dropped sequence {}", dropped.sequence);
        }
        Ok(())
    }

    /// Decode and apply one raw client packet.
    pub fn handle_packet(&self, session: SessionId, data: &[u8]) -> Result<(), SimError> {
        match ClientPacket::parse(data)? {
            ClientPacket::Input(packet) => self.enqueue_input(session, packet.into()),
            ClientPacket::Pong { nonce } => self.record_pong(session, nonce).map(|_| ()),
        }
    }

    /// Start a round-trip probe for every joined session without one in
    /// flight.
    ///
    /// Each character's own probe state is stamped under the pool lock; the
    /// pings go out afterwards.
    pub fn probe_latency(&self) -> ProbeReport {
        let now = self.clock.now_ms();
        let timeout = self.config.latency.probe_timeout_ms;
        let mut report = ProbeReport::default();
        let mut pings = Vec::new();

        for (session, handle) in self.roster.seats() {
            let nonce: u32 = rand::random();
            let stamped = self
                .roster
                .pool()
                .with_mut(handle, |c| c.latency.begin_probe(nonce, now, timeout));
            match stamped {
                Ok(true) => pings.push((session, nonce)),
                Ok(false) => report.outstanding += 1,
                Err(err) if err.is_retired_handle() => {}
                Err(err) => report.failures.push(err.into()),
            }
        }

        for (session, nonce) in pings {
            match self.gateway.send_ping(session, nonce) {
                Ok(()) => report.sent += 1,
                Err(err) => report.failures.push(err.into()),
            }
        }
        report
    }

    /// Fold a pong into the session's latency estimate; returns the round trip.
    pub fn record_pong(&self, session: SessionId, nonce: u32) -> Result<u64, SimError> {
        let handle = self
            .roster
            .handle_of(session)
            .ok_or(SimError::UnknownSession(session))?;
        let now = self.clock.now_ms();
        let smoothing = self.config.latency.smoothing;
        let (rtt, estimate) = self
            .roster
            .pool()
            .with_mut(handle, |c| {
                c.latency
                    .complete_probe(nonce, now, smoothing)
                    .map(|rtt| (rtt, c.latency.ping_ms()))
            })?
            .map_err(|reason| SimError::UnexpectedPong {
                session,
                nonce,
                reason,
            })?;
        debug!(session, "Round trip {}ms, estimate {}ms", rtt, estimate);
        Ok(rtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entity::AimAngle;
    use crate::gateway::LocalGateway;
    use crate::latency::ProbeError;
    use protocol::packets::{InputPacket, build_input, build_pong};

    fn room() -> (Room, Arc<LocalGateway>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let gateway = Arc::new(LocalGateway::new(1, 50.0));
        let room = Room::new(Config::default(), clock.clone(), gateway.clone()).unwrap();
        (room, gateway, clock)
    }

    #[test]
    fn test_join_places_user() {
        let (room, gateway, _) = room();
        let id = room.join(42).unwrap();
        assert_ne!(id, 0);
        assert_eq!(gateway.user_position(42), Some(glam::Vec3::new(0.0, 0.0, 2.0)));
        assert_eq!(room.join(42), Err(SimError::AlreadyJoined(42)));
        assert_eq!(room.stats().sessions, 1);
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = Config::default();
        config.simulation.tick_interval_ms = 0;
        let result = Room::new(
            config,
            Arc::new(ManualClock::new(0)),
            Arc::new(LocalGateway::new(1, 50.0)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_session_input() {
        let (room, _, _) = room();
        assert_eq!(
            room.enqueue_input(9, Input::default()),
            Err(SimError::UnknownSession(9))
        );
        assert_eq!(room.leave(9), Err(SimError::UnknownSession(9)));
    }

    #[test]
    fn test_handle_packet_queues_input() {
        let (room, _, _) = room();
        room.join(1).unwrap();
        let packet = InputPacket {
            sequence: 4,
            vertical: 1,
            horizontal: 0,
            rotation: 0,
            aim: 900,
            request_time_ms: 1_000_000,
        };
        room.handle_packet(1, &build_input(&packet).finish()).unwrap();

        let handle = room.roster().handle_of(1).unwrap();
        let queued = room
            .roster()
            .pool()
            .with_mut(handle, |c| c.inputs.take_latest())
            .unwrap()
            .unwrap();
        assert_eq!(queued.sequence, 4);
        assert_eq!(queued.aim, AimAngle::from_tenths(900));

        assert!(matches!(
            room.handle_packet(1, &[0xFF]),
            Err(SimError::Protocol(_))
        ));
    }

    #[test]
    fn test_probe_skips_slot_still_joining() {
        let (room, gateway, _) = room();
        room.join(5).unwrap();
        // A join that has acquired its slot but not spawned into it yet.
        let joining = room.roster().pool().acquire().unwrap();

        let report = room.probe_latency();
        assert_eq!(report.sent, 1);
        assert!(report.failures.is_empty());
        assert_eq!(gateway.take_outbox(5).len(), 1);
        let stamped = room
            .roster()
            .pool()
            .with(joining, |c| c.latency.pending().is_some())
            .unwrap();
        assert!(!stamped);
        room.roster().release(joining).unwrap();
    }

    #[test]
    fn test_probe_and_pong_update_estimate() {
        let (room, gateway, clock) = room();
        room.join(5).unwrap();

        let report = room.probe_latency();
        assert_eq!(report.sent, 1);
        assert!(report.failures.is_empty());

        let frame = gateway.take_outbox(5).pop().unwrap();
        let mut reader = protocol::BinaryReader::new(frame);
        assert_eq!(reader.get_u8().unwrap(), 0x70);
        let nonce = reader.get_u32().unwrap();

        // Second cycle inside the timeout does not re-probe.
        let again = room.probe_latency();
        assert_eq!((again.sent, again.outstanding), (0, 1));

        clock.advance(std::time::Duration::from_millis(90));
        room.handle_packet(5, &build_pong(nonce).finish()).unwrap();

        let handle = room.roster().handle_of(5).unwrap();
        let ping = room.roster().pool().with(handle, |c| c.latency.ping_ms()).unwrap();
        assert_eq!(ping, 90);

        assert_eq!(
            room.record_pong(5, nonce),
            Err(SimError::UnexpectedPong {
                session: 5,
                nonce,
                reason: ProbeError::Unsolicited
            })
        );
    }
}
