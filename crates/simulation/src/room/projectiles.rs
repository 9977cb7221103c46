//! Projectile lifecycle: launch, activate, advance, retire.
//!
//! A projectile is reachable from the active list only between `activate`
//! and `retire`. Retirement takes it off the list first, so exactly one
//! caller wins, then notifies the gateway, and only then hands the slot
//! back to the pool. Releasing earlier would let a new occupant be hit by
//! the stale removal.

use crate::entity::{AimAngle, EntityId, Owner, Projectile, ProjectileSpec};
use crate::gateway::{GatewayError, ReplicationGateway};
use crate::pool::{EntityKind, Handle, Pool, PoolError, PoolStats};
use bytes::Bytes;
use glam::Vec3;
use parking_lot::Mutex;

/// A freshly set up projectile, not yet on the active list.
#[derive(Debug, Clone)]
pub struct Launched {
    pub handle: Handle,
    pub id: EntityId,
    pub position: Vec3,
    pub variables: Bytes,
}

/// Result of one tick's advance.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub id: EntityId,
    pub position: Vec3,
    pub expired: bool,
    /// Encoded variables when a resync was requested.
    pub variables: Option<Bytes>,
}

/// A projectile taken out of the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Retirement {
    pub id: EntityId,
    /// What the gateway said about the removal.
    pub notify: Result<(), GatewayError>,
}

#[derive(Debug)]
pub struct ProjectileManager {
    pool: Pool<Projectile>,
    active: Mutex<Vec<Handle>>,
    spec: ProjectileSpec,
}

impl ProjectileManager {
    pub fn new(capacity: usize, spec: ProjectileSpec) -> Self {
        Self {
            pool: Pool::new(EntityKind::Projectile, capacity),
            active: Mutex::new(Vec::with_capacity(capacity)),
            spec,
        }
    }

    pub fn pool(&self) -> &Pool<Projectile> {
        &self.pool
    }

    pub fn spec(&self) -> &ProjectileSpec {
        &self.spec
    }

    /// Acquire a slot and set the projectile up at `initial_age`.
    pub fn launch(
        &self,
        id: EntityId,
        owner: Owner,
        origin: Vec3,
        aim: AimAngle,
        initial_age: f32,
    ) -> Result<Launched, PoolError> {
        let handle = self.pool.acquire()?;
        let spec = self.spec;
        let setup = self.pool.with_mut(handle, |p| {
            p.setup(id, owner, origin, aim, initial_age, &spec);
            (p.position, p.variables().encode())
        });
        match setup {
            Ok((position, variables)) => Ok(Launched {
                handle,
                id,
                position,
                variables,
            }),
            Err(err) => {
                let _ = self.pool.release(handle);
                Err(err)
            }
        }
    }

    /// Put a launched projectile on the active list.
    pub fn activate(&self, handle: Handle) {
        self.active.lock().push(handle);
    }

    /// Give back a launched projectile that never became active.
    pub fn discard(&self, handle: Handle) -> Result<(), PoolError> {
        self.pool.release(handle)
    }

    /// Copy of the active list. Iteration happens on the copy.
    pub fn active_snapshot(&self) -> Vec<Handle> {
        self.active.lock().clone()
    }

    pub fn active_len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn advance(&self, handle: Handle, dt: f32, resync: bool) -> Result<Advanced, PoolError> {
        self.pool.with_mut(handle, |p| {
            p.advance(dt);
            Advanced {
                id: p.id,
                position: p.position,
                expired: p.is_expired(),
                variables: resync.then(|| p.variables().encode()),
            }
        })
    }

    /// Retire an active projectile: off the active list, `remove_entity`,
    /// then release.
    ///
    /// `Ok(None)` means someone else already retired it.
    pub fn retire(
        &self,
        handle: Handle,
        gateway: &dyn ReplicationGateway,
    ) -> Result<Option<Retirement>, PoolError> {
        {
            let mut active = self.active.lock();
            let Some(at) = active.iter().position(|h| *h == handle) else {
                return Ok(None);
            };
            active.swap_remove(at);
        }
        let id = self.pool.with(handle, |p| p.id)?;
        let notify = gateway.remove_entity(id);
        self.pool.release(handle)?;
        Ok(Some(Retirement { id, notify }))
    }

    /// Active projectiles fired by `owner`.
    pub fn owned_by(&self, owner: Handle) -> Vec<Handle> {
        self.active_snapshot()
            .into_iter()
            .filter(|&h| {
                self.pool
                    .with(h, |p| p.owner.is_some_and(|o| o.handle == owner))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
