//! Projectiles.
//!
//! A projectile flies in a straight line from its departure point to a
//! destination fixed at spawn. Its position is never integrated; it is
//! always derived from age, so clients that know departure, destination and
//! age reproduce it exactly.

use super::{AimAngle, EntityId, SessionId};
use crate::pool::{Handle, Poolable};
use glam::{Vec2, Vec3};
use protocol::ProjectileVariables;

/// Weak back-reference to the character that fired a projectile.
///
/// The handle may go stale once the character leaves; it is only compared,
/// never dereferenced through the projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub handle: Handle,
    pub session: SessionId,
}

/// Per-type projectile parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpec {
    pub kind: u8,
    pub velocity: f32,
    pub max_age: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Projectile {
    pub id: EntityId,
    pub kind: u8,
    pub owner: Option<Owner>,
    /// Planar `(x, z)` departure.
    pub departure: Vec2,
    /// Planar `(x, z)` destination, `departure + direction * max_age * velocity`.
    pub destination: Vec2,
    pub direction: Vec2,
    pub velocity: f32,
    /// Seconds since the shot, compensated for delivery delay.
    pub age: f32,
    pub max_age: f32,
    /// Height the projectile travels at.
    pub height: f32,
    pub position: Vec3,
}

impl Projectile {
    /// Launch from `origin` toward `aim`, already aged by `initial_age`.
    pub fn setup(
        &mut self,
        id: EntityId,
        owner: Owner,
        origin: Vec3,
        aim: AimAngle,
        initial_age: f32,
        spec: &ProjectileSpec,
    ) {
        self.id = id;
        self.kind = spec.kind;
        self.owner = Some(owner);
        self.velocity = spec.velocity;
        self.max_age = spec.max_age;
        self.age = initial_age.max(0.0);
        self.height = origin.y;
        self.departure = Vec2::new(origin.x, origin.z);
        self.direction = aim.direction();
        self.destination = self.departure + self.direction * self.max_age * self.velocity;
        self.position = self.position_at(self.age);
    }

    /// Linear interpolation between departure and destination by age.
    pub fn position_at(&self, age: f32) -> Vec3 {
        let t = if self.max_age > 0.0 {
            (age / self.max_age).clamp(0.0, 1.0)
        } else {
            1.0
        };
        // Pin the endpoints so they are exact, not lerp-rounded.
        let planar = if t >= 1.0 {
            self.destination
        } else if t <= 0.0 {
            self.departure
        } else {
            self.departure + (self.destination - self.departure) * t
        };
        Vec3::new(planar.x, self.height, planar.y)
    }

    /// Age by `dt` seconds and recompute position.
    pub fn advance(&mut self, dt: f32) {
        self.age += dt;
        self.position = self.position_at(self.age);
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_age
    }

    /// Replicated variable set (`t, x, z, l, u, a, m`).
    pub fn variables(&self) -> ProjectileVariables {
        ProjectileVariables {
            kind: self.kind,
            departure_x: self.departure.x,
            departure_z: self.departure.y,
            destination_x: self.destination.x,
            destination_z: self.destination.y,
            age: self.age,
            max_age: self.max_age,
        }
    }
}

impl Poolable for Projectile {
    fn reset(&mut self) {
        *self = Self::default();
    }
}
