// Shared room fixture for the scenario tests.
#![allow(dead_code)]

use protocol::BinaryReader;
use simulation::config::Config;
use simulation::entity::{AimAngle, EntityId, Input, SessionId};
use simulation::{Clock, LocalGateway, ManualClock, Room, TickReport};
use std::sync::Arc;
use std::time::Duration;

pub const START_MS: u64 = 1_700_000_000_000;
pub const TICK: Duration = Duration::from_millis(50);
pub const DT: f32 = 0.05;

pub struct Fixture {
    pub room: Arc<Room>,
    pub gateway: Arc<LocalGateway>,
    pub clock: Arc<ManualClock>,
}

pub fn fixture() -> Fixture {
    fixture_with(Config::default())
}

pub fn fixture_with(config: Config) -> Fixture {
    let clock = Arc::new(ManualClock::new(START_MS));
    let gateway = Arc::new(LocalGateway::new(
        config.simulation.room_id,
        config.replication.proximity_radius,
    ));
    let room = Room::new(config, clock.clone(), gateway.clone()).expect("valid config");
    Fixture {
        room: Arc::new(room),
        gateway,
        clock,
    }
}

impl Fixture {
    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Advance the clock by one interval and step.
    pub fn tick(&self) -> TickReport {
        self.clock.advance(TICK);
        self.room.step(DT)
    }

    /// Queue an aimed input issued `delay_ms` before the current server time.
    pub fn aim(&self, session: SessionId, sequence: u32, tenths: i16, delay_ms: u64) {
        self.room
            .enqueue_input(
                session,
                Input {
                    sequence,
                    aim: AimAngle::from_tenths(tenths),
                    request_time_ms: self.now() - delay_ms,
                    ..Default::default()
                },
            )
            .expect("session joined");
    }

    /// Run one probe round trip for `session` taking `rtt_ms`.
    pub fn measure_ping(&self, session: SessionId, rtt_ms: u64) {
        self.gateway.take_outbox(session);
        let report = self.room.probe_latency();
        assert!(report.failures.is_empty());
        let frame = self
            .gateway
            .take_outbox(session)
            .pop()
            .expect("ping frame queued");
        let mut reader = BinaryReader::new(frame);
        assert_eq!(reader.get_u8().unwrap(), 0x70);
        let nonce = reader.get_u32().unwrap();
        self.clock.advance(Duration::from_millis(rtt_ms));
        self.room.record_pong(session, nonce).expect("pong accepted");
    }

    /// Entity ids of the projectiles currently on the active list.
    pub fn active_projectile_ids(&self) -> Vec<EntityId> {
        let projectiles = self.room.projectiles();
        projectiles
            .active_snapshot()
            .into_iter()
            .map(|h| projectiles.pool().with(h, |p| p.id).unwrap())
            .collect()
    }

    pub fn assert_conserved(&self) {
        let stats = self.room.stats();
        assert_eq!(
            stats.characters.active + stats.characters.free,
            stats.characters.capacity
        );
        assert_eq!(
            stats.projectiles.active + stats.projectiles.free,
            stats.projectiles.capacity
        );
        assert!(stats.active_projectiles <= stats.projectiles.active);
    }
}
