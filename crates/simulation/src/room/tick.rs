//! The simulation step.
//!
//! Characters and projectiles are iterated from handle snapshots taken when
//! each phase starts. Joins, leaves and spawns that land mid-tick mutate the
//! live sets, never the snapshot, and every access through a snapshot handle
//! is generation-checked. A handle retired concurrently is skipped silently;
//! anything else that fails is recorded against its entity and the step moves
//! on to the next one.

use super::Room;
use crate::entity::{EntityId, Owner, SessionId};
use crate::error::SimError;
use crate::gateway::{CharacterStateEntry, GatewayError};
use crate::movement::{self, CharacterState};
use crate::pool::Handle;
use crate::weapon::ShotPlan;
use glam::Vec3;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

/// Where in the step a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    /// Consuming an input and integrating movement.
    Input,
    /// Spawning an accepted shot.
    Weapon,
    /// Advancing and publishing a projectile.
    Projectile,
    /// Retiring an expired projectile.
    Expiry,
    /// Handing state to the gateway.
    Replication,
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickPhase::Input => "input",
            TickPhase::Weapon => "weapon",
            TickPhase::Projectile => "projectile",
            TickPhase::Expiry => "expiry",
            TickPhase::Replication => "replication",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickFailure {
    pub phase: TickPhase,
    pub entity: Option<EntityId>,
    /// Pool slot involved, when the entity itself could not be read.
    pub handle: Option<Handle>,
    pub error: SimError,
}

/// Everything one step did, including what it could not do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Character states in the order they were handed to the gateway.
    pub states: Vec<CharacterState>,
    pub spawned: Vec<EntityId>,
    pub expired: Vec<EntityId>,
    /// Whether projectile variables were republished this tick.
    pub resynced: bool,
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, phase: TickPhase, entity: Option<EntityId>, error: impl Into<SimError>) {
        self.failures.push(TickFailure {
            phase,
            entity,
            handle: None,
            error: error.into(),
        });
    }

    fn fail_at(&mut self, phase: TickPhase, handle: Handle, error: impl Into<SimError>) {
        self.failures.push(TickFailure {
            phase,
            entity: None,
            handle: Some(handle),
            error: error.into(),
        });
    }
}

/// A character's contribution to this tick, taken under the pool lock.
struct Simulated {
    state: CharacterState,
    shot: Option<(ShotPlan, Owner)>,
}

/// What the character phase hands to the later phases.
#[derive(Default)]
struct CharacterPass {
    /// Projectiles spawned this tick.
    fresh: HashSet<Handle>,
    /// Character handle behind each entry of `TickReport::states`.
    seats: Vec<Handle>,
}

impl Room {
    /// Advance the room by `dt` seconds.
    pub fn step(&self, dt: f32) -> TickReport {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let resync = tick % self.config.simulation.resync_interval_ticks == 0;
        let mut report = TickReport {
            tick,
            resynced: resync,
            ..Default::default()
        };

        let pass = self.step_characters(dt, &mut report);
        self.step_projectiles(dt, resync, &pass.fresh, &mut report);
        self.replicate_states(&pass.seats, &mut report);
        report
    }

    fn step_characters(&self, dt: f32, report: &mut TickReport) -> CharacterPass {
        let now = self.clock.now_ms();
        let turn_rate = self.config.character.turn_rate_deg;
        let mut pass = CharacterPass::default();

        for handle in self.roster.active_handles() {
            let simulated = self.roster.pool().with_mut(handle, |c| {
                let input = c.inputs.take_latest()?;
                let outcome = movement::integrate(c, &input, dt, turn_rate);
                c.transform = outcome.transform;
                c.last_sequence = Some(input.sequence);
                let shot = c.weapon.evaluate(now, &input, c.latency.ping_ms()).map(|plan| {
                    (
                        plan,
                        Owner {
                            handle,
                            session: c.session,
                        },
                    )
                });
                Some(Simulated {
                    state: outcome.state,
                    shot,
                })
            });

            let simulated = match simulated {
                Ok(Some(simulated)) => simulated,
                Ok(None) => continue,
                Err(err) if err.is_retired_handle() => continue,
                Err(err) => {
                    report.fail_at(TickPhase::Input, handle, err);
                    continue;
                }
            };

            let state = simulated.state;
            if let Err(err) =
                self.gateway
                    .set_user_position(state.session, state.transform.position, self.id())
            {
                report.fail(TickPhase::Replication, Some(state.character), err);
            }

            // A leave that ran since the pool lock was dropped may already
            // have removed the user; undo the placement and drop the rest.
            if !self.roster.is_current(state.session, handle) {
                self.unplace(state.session, state.character, report);
                continue;
            }

            if let Some((plan, owner)) = simulated.shot {
                if let Some(spawned) =
                    self.fire(handle, state.character, owner, state.transform.position, &plan, report)
                {
                    pass.fresh.insert(spawned);
                }
            }
            report.states.push(state);
            pass.seats.push(handle);
        }
        pass
    }

    /// Withdraw a placement made for a session that left mid-tick.
    fn unplace(&self, session: SessionId, character: EntityId, report: &mut TickReport) {
        // Rejoined under a new character; that placement is not ours.
        if self.roster.handle_of(session).is_some() {
            return;
        }
        match self.gateway.remove_user(session) {
            Ok(()) => debug!(
                tick = report.tick,
                entity = character,
                "Withdrew placement of departed session {}",
                session
            ),
            // The leave's own removal came after ours.
            Err(GatewayError::UnknownUser(_)) => {}
            Err(err) => report.fail(TickPhase::Replication, Some(character), err),
        }
    }

    /// Spawn the projectile for an accepted shot, then commit the cooldown.
    ///
    /// Exhaustion rejects the shot without touching the weapon. The projectile
    /// is published before it becomes active, so a concurrent leave can only
    /// see it once the gateway knows about it.
    fn fire(
        &self,
        shooter: Handle,
        character: EntityId,
        owner: Owner,
        origin: Vec3,
        plan: &ShotPlan,
        report: &mut TickReport,
    ) -> Option<Handle> {
        let id = self.ids.next_id();
        let launched = match self
            .projectiles
            .launch(id, owner, origin, plan.aim, plan.execution_delay)
        {
            Ok(launched) => launched,
            Err(err) => {
                warn!(tick = report.tick, entity = character, "Shot dropped: {}", err);
                report.fail(TickPhase::Weapon, Some(character), err);
                return None;
            }
        };

        match self.roster.pool().with_mut(shooter, |c| c.weapon.commit(plan)) {
            Ok(()) => {}
            Err(err) => {
                // Shooter left mid-tick; the shot goes with it.
                if let Err(discard) = self.projectiles.discard(launched.handle) {
                    report.fail(TickPhase::Weapon, Some(id), discard);
                }
                if !err.is_retired_handle() {
                    report.fail(TickPhase::Weapon, Some(character), err);
                }
                return None;
            }
        }

        if let Err(err) = self.gateway.set_entity_variables(id, launched.variables) {
            report.fail(TickPhase::Replication, Some(id), err);
        }
        if let Err(err) = self.gateway.set_entity_position(id, launched.position, self.id()) {
            report.fail(TickPhase::Replication, Some(id), err);
        }
        self.projectiles.activate(launched.handle);

        // The owner's leave detaches before scanning for its projectiles, so
        // a shooter still seated here means that scan will see this one.
        if !self.roster.is_current(owner.session, shooter) {
            match self.projectiles.retire(launched.handle, self.gateway.as_ref()) {
                Ok(Some(retired)) => {
                    if let Err(err) = retired.notify {
                        report.fail(TickPhase::Weapon, Some(id), err);
                    }
                }
                Ok(None) => {}
                Err(err) => report.fail(TickPhase::Weapon, Some(id), err),
            }
            debug!(
                tick = report.tick,
                entity = id,
                "Shot withdrawn, {} left while firing",
                character
            );
            return None;
        }

        debug!(
            tick = report.tick,
            entity = id,
            "Projectile spawned by {} (delay {}ms, ping {}ms)",
            character,
            plan.delay_ms,
            plan.ping_ms
        );
        report.spawned.push(id);
        Some(launched.handle)
    }

    fn step_projectiles(&self, dt: f32, resync: bool, fresh: &HashSet<Handle>, report: &mut TickReport) {
        for handle in self.projectiles.active_snapshot() {
            // Spawned already aged; starts moving next tick.
            if fresh.contains(&handle) {
                continue;
            }
            let advanced = match self.projectiles.advance(handle, dt, resync) {
                Ok(advanced) => advanced,
                Err(err) if err.is_retired_handle() => continue,
                Err(err) => {
                    report.fail_at(TickPhase::Projectile, handle, err);
                    continue;
                }
            };

            if advanced.expired {
                self.expire(handle, advanced.id, report);
                continue;
            }

            if let Err(err) = self
                .gateway
                .set_entity_position(advanced.id, advanced.position, self.id())
            {
                report.fail(TickPhase::Projectile, Some(advanced.id), err);
            }
            if let Some(variables) = advanced.variables {
                if let Err(err) = self.gateway.set_entity_variables(advanced.id, variables) {
                    report.fail(TickPhase::Projectile, Some(advanced.id), err);
                }
            }
        }
    }

    fn expire(&self, handle: Handle, id: EntityId, report: &mut TickReport) {
        match self.projectiles.retire(handle, self.gateway.as_ref()) {
            Ok(Some(retired)) => {
                if let Err(err) = retired.notify {
                    report.fail(TickPhase::Expiry, Some(retired.id), err);
                }
                debug!(tick = report.tick, entity = retired.id, "Projectile expired");
                report.expired.push(retired.id);
            }
            // A leave got there first.
            Ok(None) => {}
            Err(err) => report.fail(TickPhase::Expiry, Some(id), err),
        }
    }

    fn replicate_states(&self, seats: &[Handle], report: &mut TickReport) {
        // Sessions that left after their character was stepped.
        let mut seated = seats.iter();
        report.states.retain(|state| {
            seated
                .next()
                .is_some_and(|&h| self.roster.is_current(state.session, h))
        });
        if report.states.is_empty() {
            return;
        }
        let batch: Vec<CharacterStateEntry> = report
            .states
            .iter()
            .map(|state| {
                let mut observers = self.gateway.proximity_list(state.transform.position);
                if !observers.contains(&state.session) {
                    observers.push(state.session);
                }
                CharacterStateEntry {
                    state: *state,
                    observers,
                }
            })
            .collect();

        if let Err(err) = self.gateway.send_character_states(&batch) {
            report.fail(TickPhase::Replication, None, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Character;
    use crate::pool::{EntityKind, HandleFault, Pool, PoolError};

    #[test]
    fn test_slot_failure_keeps_handle() {
        let pool: Pool<Character> = Pool::new(EntityKind::Character, 1);
        let handle = pool.acquire().unwrap();
        let err = PoolError::InvalidHandle {
            kind: EntityKind::Character,
            handle,
            fault: HandleFault::OutOfRange,
        };

        let mut report = TickReport::default();
        report.fail_at(TickPhase::Input, handle, err);
        report.fail(TickPhase::Expiry, Some(4), err);

        assert_eq!(report.failures[0].handle, Some(handle));
        assert_eq!(report.failures[0].entity, None);
        assert_eq!(report.failures[1].entity, Some(4));
        assert_eq!(report.failures[1].handle, None);
        assert!(!report.is_clean());
    }
}
