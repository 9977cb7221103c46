//! Periodic drivers for a room: the simulation tick and the latency cycle.

use super::{Room, TickFailure};
use crate::scheduler::{ScheduledTask, TaskScheduler};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A room with its tick and probe tasks running. Dropping it stops both.
pub struct RoomRuntime {
    room: Arc<Room>,
    tick: ScheduledTask,
    probe: ScheduledTask,
}

impl RoomRuntime {
    pub fn start(room: Arc<Room>, scheduler: &TaskScheduler) -> Self {
        let simulation = &room.config().simulation;
        let interval = simulation.tick_interval();
        let dt = interval.as_secs_f32();
        let tick_budget = simulation.tick_interval_ms as f64 * simulation.slow_tick_warn_ratio;

        let tick_room = room.clone();
        let tick = scheduler.schedule_at_fixed_rate("tick", interval, interval, move || {
            let tick_start = std::time::Instant::now();
            let report = tick_room.step(dt);
            let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;

            for failure in &report.failures {
                log_failure(report.tick, failure);
            }
            if tick_ms > tick_budget {
                let stats = tick_room.stats();
                warn!(
                    "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} characters, {} projectiles",
                    report.tick,
                    tick_ms,
                    tick_budget,
                    stats.characters.active,
                    stats.active_projectiles
                );
            }
        });

        let probe_interval = room.config().latency.probe_interval();
        let probe_room = room.clone();
        let probe = scheduler.schedule_at_fixed_rate(
            "latency-probe",
            probe_interval,
            probe_interval,
            move || {
                let report = probe_room.probe_latency();
                for failure in &report.failures {
                    warn!("Latency probe failed: {}", failure);
                }
                if report.sent > 0 || report.outstanding > 0 {
                    debug!(
                        "Latency probes sent: {} ({} still outstanding)",
                        report.sent, report.outstanding
                    );
                }
            },
        );

        info!(
            "Room {} running: tick every {:?}, latency probe every {:?}",
            room.id(),
            interval,
            probe_interval
        );
        Self { room, tick, probe }
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    pub fn shutdown(self) {
        self.tick.cancel();
        self.probe.cancel();
        info!(
            "Room {} stopped after {} ticks",
            self.room.id(),
            self.room.current_tick()
        );
    }
}

fn log_failure(tick: u64, failure: &TickFailure) {
    let entity = failure.entity.unwrap_or_default();
    let slot = failure.handle.map(|h| h.to_string()).unwrap_or_default();
    if failure.error.is_invalid_handle() {
        error!(tick, entity, slot, phase = %failure.phase, "Lifecycle violation: {}", failure.error);
    } else if failure.error.is_collaborator() {
        warn!(tick, entity, slot, phase = %failure.phase, "Gateway rejected update: {}", failure.error);
    } else {
        warn!(tick, entity, slot, phase = %failure.phase, "Tick step failed: {}", failure.error);
    }
}
