//! Fixed-capacity entity pools.
//!
//! The pool owns the backing storage for every instance of one entity kind,
//! free or active. Everything else in the room refers to entities through
//! [`Handle`]s. A handle carries the slot generation it was issued with, so a
//! handle kept past `release` is detected instead of silently aliasing the
//! slot's next occupant.

use fixedbitset::FixedBitSet;
use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;

/// Which pool an error or handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Character,
    Projectile,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Character => f.write_str("character"),
            EntityKind::Projectile => f.write_str("projectile"),
        }
    }
}

/// Opaque reference to one pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Why a handle was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HandleFault {
    #[error("slot is not active")]
    NotActive,
    #[error("slot was recycled since the handle was issued")]
    Stale,
    #[error("index out of range")]
    OutOfRange,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("{kind} pool exhausted (capacity {capacity})")]
    Exhausted { kind: EntityKind, capacity: usize },

    #[error("invalid {kind} handle {handle}: {fault}")]
    InvalidHandle {
        kind: EntityKind,
        handle: Handle,
        fault: HandleFault,
    },
}

impl PoolError {
    /// True when the handle was valid once but its slot has since been
    /// released (and possibly reissued). Concurrent leave/expiry produce this.
    pub fn is_retired_handle(&self) -> bool {
        matches!(
            self,
            PoolError::InvalidHandle {
                fault: HandleFault::NotActive | HandleFault::Stale,
                ..
            }
        )
    }
}

/// An entity that can live in a [`Pool`].
pub trait Poolable: Default + Send {
    /// Return the entity to its pristine state before the slot is reused.
    fn reset(&mut self);
}

/// Occupancy counts taken under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub active: usize,
    pub free: usize,
}

#[derive(Debug)]
struct Slots<T> {
    entities: Vec<T>,
    generations: Vec<u32>,
    occupied: FixedBitSet,
    free: Vec<u32>,
}

impl<T> Slots<T> {
    fn check(&self, kind: EntityKind, handle: Handle) -> Result<usize, PoolError> {
        let index = handle.index();
        let fault = if index >= self.entities.len() {
            Some(HandleFault::OutOfRange)
        } else if !self.occupied.contains(index) {
            Some(HandleFault::NotActive)
        } else if self.generations[index] != handle.generation {
            Some(HandleFault::Stale)
        } else {
            None
        };
        match fault {
            Some(fault) => Err(PoolError::InvalidHandle { kind, handle, fault }),
            None => Ok(index),
        }
    }
}

/// Fixed-capacity allocator for one entity kind.
#[derive(Debug)]
pub struct Pool<T> {
    kind: EntityKind,
    capacity: usize,
    slots: Mutex<Slots<T>>,
}

impl<T: Poolable> Pool<T> {
    /// Preallocate `capacity` entities.
    pub fn new(kind: EntityKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            slots: Mutex::new(Slots {
                entities: (0..capacity).map(|_| T::default()).collect(),
                generations: vec![0; capacity],
                occupied: FixedBitSet::with_capacity(capacity),
                // Reversed so slot 0 is handed out first.
                free: (0..capacity as u32).rev().collect(),
            }),
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a free slot. Exhaustion is an expected runtime condition.
    pub fn acquire(&self) -> Result<Handle, PoolError> {
        let mut slots = self.slots.lock();
        let Some(index) = slots.free.pop() else {
            return Err(PoolError::Exhausted {
                kind: self.kind,
                capacity: self.capacity,
            });
        };
        slots.occupied.insert(index as usize);
        Ok(Handle {
            index,
            generation: slots.generations[index as usize],
        })
    }

    /// Reset the entity and return its slot to the free set.
    ///
    /// Releasing a handle that is not currently active (double release, or a
    /// handle from before the slot was recycled) is refused and leaves the
    /// pool untouched.
    pub fn release(&self, handle: Handle) -> Result<(), PoolError> {
        let mut slots = self.slots.lock();
        let index = slots.check(self.kind, handle)?;
        slots.entities[index].reset();
        slots.occupied.set(index, false);
        slots.generations[index] = slots.generations[index].wrapping_add(1);
        slots.free.push(handle.index);
        Ok(())
    }

    /// Read an active entity.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Result<R, PoolError> {
        let slots = self.slots.lock();
        let index = slots.check(self.kind, handle)?;
        Ok(f(&slots.entities[index]))
    }

    /// Mutate an active entity. Keep `f` short: the whole pool is locked.
    pub fn with_mut<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Result<R, PoolError> {
        let mut slots = self.slots.lock();
        let index = slots.check(self.kind, handle)?;
        Ok(f(&mut slots.entities[index]))
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        self.slots.lock().check(self.kind, handle).is_ok()
    }

    /// Snapshot of every active handle, in slot order.
    pub fn active_handles(&self) -> Vec<Handle> {
        let slots = self.slots.lock();
        slots
            .occupied
            .ones()
            .map(|index| Handle {
                index: index as u32,
                generation: slots.generations[index],
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        PoolStats {
            capacity: self.capacity,
            active: slots.occupied.count_ones(..),
            free: slots.free.len(),
        }
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.stats().active
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.stats().free
    }
}
