//! Simulated entities.
//!
//! Characters and projectiles live in pools; inputs are plain values queued
//! on their character.

mod character;
mod input;
mod projectile;

pub use character::{Character, Transform};
pub use input::{AimAngle, Input, InputBuffer};
pub use projectile::{Owner, Projectile, ProjectileSpec};

use std::sync::atomic::{AtomicU32, Ordering};

/// Replicated entity identifier.
pub type EntityId = u32;
/// Connected session identifier, owned by the session layer.
pub type SessionId = u64;
/// Room identifier passed through to the replication gateway.
pub type RoomId = u32;

/// Issues entity ids for one room. Ids are never 0.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }
}

impl IdAllocator {
    pub fn next_id(&self) -> EntityId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_skip_zero_on_wrap() {
        let ids = IdAllocator {
            next: AtomicU32::new(u32::MAX),
        };
        assert_eq!(ids.next_id(), u32::MAX);
        assert_eq!(ids.next_id(), 1);
    }
}
