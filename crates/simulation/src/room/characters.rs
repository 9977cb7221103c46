//! Session to character mapping on top of the character pool.

use crate::entity::{Character, SessionId};
use crate::error::SimError;
use crate::pool::{EntityKind, Handle, Pool, PoolError};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Characters of one room, indexed by session.
///
/// Lock order is `sessions` then the pool. Nothing takes them the other way
/// round.
#[derive(Debug)]
pub struct CharacterRoster {
    pool: Pool<Character>,
    sessions: Mutex<HashMap<SessionId, Handle>>,
}

impl CharacterRoster {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Pool::new(EntityKind::Character, capacity),
            sessions: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn pool(&self) -> &Pool<Character> {
        &self.pool
    }

    /// Allocate and spawn a character for `session`.
    ///
    /// The session map stays locked across the acquire so two joins for the
    /// same session cannot both succeed.
    pub fn join(&self, session: SessionId, spawn: impl FnOnce(&mut Character)) -> Result<Handle, SimError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session) {
            return Err(SimError::AlreadyJoined(session));
        }
        let handle = self.pool.acquire()?;
        if let Err(err) = self.pool.with_mut(handle, spawn) {
            let _ = self.pool.release(handle);
            return Err(err.into());
        }
        sessions.insert(session, handle);
        Ok(handle)
    }

    /// Drop the session mapping. The caller owns the returned handle's release.
    pub fn detach(&self, session: SessionId) -> Option<Handle> {
        self.sessions.lock().remove(&session)
    }

    pub fn handle_of(&self, session: SessionId) -> Option<Handle> {
        self.sessions.lock().get(&session).copied()
    }

    /// Whether `session` is still seated on `handle`.
    ///
    /// A leave detaches the session before anything else, so once this is
    /// false the leave's teardown is already under way.
    pub fn is_current(&self, session: SessionId, handle: Handle) -> bool {
        self.handle_of(session) == Some(handle)
    }

    /// Snapshot of every joined session and its character, in slot order.
    ///
    /// Unlike [`active_handles`](Self::active_handles) this never includes a
    /// slot a join has acquired but not yet spawned.
    pub fn seats(&self) -> Vec<(SessionId, Handle)> {
        let mut seats: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .map(|(&session, &handle)| (session, handle))
            .collect();
        seats.sort_unstable_by_key(|(_, handle)| handle.index());
        seats
    }

    pub fn release(&self, handle: Handle) -> Result<(), PoolError> {
        self.pool.release(handle)
    }

    pub fn active_handles(&self) -> Vec<Handle> {
        self.pool.active_handles()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn spawn(session: SessionId) -> impl FnOnce(&mut Character) {
        move |c| c.spawn(1, session, Vec3::ZERO, 8.0, 500, 4)
    }

    #[test]
    fn test_second_join_rejected() {
        let roster = CharacterRoster::new(4);
        let handle = roster.join(7, spawn(7)).unwrap();
        assert_eq!(roster.join(7, spawn(7)), Err(SimError::AlreadyJoined(7)));
        assert_eq!(roster.handle_of(7), Some(handle));
        assert_eq!(roster.pool().active_count(), 1);
    }

    #[test]
    fn test_full_roster_reports_exhaustion() {
        let roster = CharacterRoster::new(1);
        roster.join(1, spawn(1)).unwrap();
        let err = roster.join(2, spawn(2)).unwrap_err();
        assert!(err.is_pool_exhausted());
        assert_eq!(roster.handle_of(2), None);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_detach_then_release() {
        let roster = CharacterRoster::new(2);
        let handle = roster.join(3, spawn(3)).unwrap();
        assert_eq!(roster.detach(3), Some(handle));
        assert_eq!(roster.detach(3), None);
        roster.release(handle).unwrap();
        assert!(roster.is_empty());
        assert_eq!(roster.pool().free_count(), 2);
    }

    #[test]
    fn test_seats_skip_unspawned_slots() {
        let roster = CharacterRoster::new(3);
        let seated = roster.join(9, spawn(9)).unwrap();
        let pending = roster.pool().acquire().unwrap();

        assert_eq!(roster.active_handles().len(), 2);
        assert_eq!(roster.seats(), vec![(9, seated)]);
        assert!(roster.is_current(9, seated));
        assert!(!roster.is_current(9, pending));

        roster.detach(9);
        assert!(!roster.is_current(9, seated));
    }
}
