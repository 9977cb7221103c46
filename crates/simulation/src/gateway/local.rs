//! In-memory replication gateway.
//!
//! Tracks what a real transport would have published and encodes outgoing
//! frames with the wire protocol into a per-session outbox. Used by the
//! standalone binary and by tests that assert on replicated state.

use super::{CharacterStateEntry, GatewayError, ReplicationGateway};
use crate::entity::{EntityId, RoomId, SessionId};
use bytes::Bytes;
use glam::Vec3;
use parking_lot::Mutex;
use protocol::ProjectileVariables;
use protocol::packets::{build_character_state, build_ping};
use std::collections::{HashMap, HashSet, VecDeque};

/// How many removed entity ids are remembered for rejecting late updates.
pub const REMOVED_HISTORY: usize = 4096;

#[derive(Debug, Default)]
struct TrackedEntity {
    position: Option<Vec3>,
    variables: Option<Bytes>,
    position_updates: u64,
    variable_updates: u64,
}

/// Recently removed entity ids, oldest first, capped at [`REMOVED_HISTORY`].
#[derive(Debug, Default)]
struct RemovedLog {
    order: VecDeque<EntityId>,
    ids: HashSet<EntityId>,
}

impl RemovedLog {
    fn record(&mut self, entity: EntityId) {
        if !self.ids.insert(entity) {
            return;
        }
        self.order.push_back(entity);
        if self.order.len() > REMOVED_HISTORY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.ids.contains(&entity)
    }
}

#[derive(Debug, Default)]
struct LocalState {
    entities: HashMap<EntityId, TrackedEntity>,
    removed: RemovedLog,
    users: HashMap<SessionId, Vec3>,
    outbox: HashMap<SessionId, Vec<Bytes>>,
}

impl LocalState {
    fn live_entity(&mut self, entity: EntityId) -> Result<&mut TrackedEntity, GatewayError> {
        if self.removed.contains(entity) {
            return Err(GatewayError::Rejected(format!("entity {entity} already removed")));
        }
        Ok(self.entities.entry(entity).or_default())
    }
}

#[derive(Debug)]
pub struct LocalGateway {
    room: RoomId,
    proximity_radius: f32,
    state: Mutex<LocalState>,
}

impl LocalGateway {
    pub fn new(room: RoomId, proximity_radius: f32) -> Self {
        Self {
            room,
            proximity_radius,
            state: Mutex::new(LocalState::default()),
        }
    }

    fn check_room(&self, room: RoomId) -> Result<(), GatewayError> {
        if room != self.room {
            return Err(GatewayError::Rejected(format!(
                "room {room} is not served here (expected {})",
                self.room
            )));
        }
        Ok(())
    }

    pub fn entity_position(&self, entity: EntityId) -> Option<Vec3> {
        self.state.lock().entities.get(&entity).and_then(|e| e.position)
    }

    /// Decoded variable blob last published for `entity`.
    pub fn entity_variables(&self, entity: EntityId) -> Option<ProjectileVariables> {
        let blob = self.state.lock().entities.get(&entity)?.variables.clone()?;
        ProjectileVariables::decode(blob).ok()
    }

    pub fn position_updates(&self, entity: EntityId) -> u64 {
        self.state
            .lock()
            .entities
            .get(&entity)
            .map_or(0, |e| e.position_updates)
    }

    pub fn variable_updates(&self, entity: EntityId) -> u64 {
        self.state
            .lock()
            .entities
            .get(&entity)
            .map_or(0, |e| e.variable_updates)
    }

    pub fn tracked_entities(&self) -> usize {
        self.state.lock().entities.len()
    }

    /// The most recent removals, oldest first.
    pub fn removed_entities(&self) -> Vec<EntityId> {
        self.state.lock().removed.order.iter().copied().collect()
    }

    pub fn user_position(&self, session: SessionId) -> Option<Vec3> {
        self.state.lock().users.get(&session).copied()
    }

    /// Drain frames queued for `session`.
    pub fn take_outbox(&self, session: SessionId) -> Vec<Bytes> {
        self.state
            .lock()
            .outbox
            .get_mut(&session)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl ReplicationGateway for LocalGateway {
    fn set_entity_position(&self, entity: EntityId, position: Vec3, room: RoomId) -> Result<(), GatewayError> {
        self.check_room(room)?;
        let mut state = self.state.lock();
        let tracked = state.live_entity(entity)?;
        tracked.position = Some(position);
        tracked.position_updates += 1;
        Ok(())
    }

    fn set_entity_variables(&self, entity: EntityId, variables: Bytes) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        let tracked = state.live_entity(entity)?;
        tracked.variables = Some(variables);
        tracked.variable_updates += 1;
        Ok(())
    }

    fn remove_entity(&self, entity: EntityId) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if state.entities.remove(&entity).is_none() {
            return Err(GatewayError::UnknownEntity(entity));
        }
        state.removed.record(entity);
        Ok(())
    }

    fn proximity_list(&self, position: Vec3) -> Vec<SessionId> {
        let radius_sq = self.proximity_radius * self.proximity_radius;
        let state = self.state.lock();
        let mut observers: Vec<SessionId> = state
            .users
            .iter()
            .filter(|(_, p)| {
                let dx = p.x - position.x;
                let dz = p.z - position.z;
                dx * dx + dz * dz <= radius_sq
            })
            .map(|(&session, _)| session)
            .collect();
        observers.sort_unstable();
        observers
    }

    fn set_user_position(&self, session: SessionId, position: Vec3, room: RoomId) -> Result<(), GatewayError> {
        self.check_room(room)?;
        self.state.lock().users.insert(session, position);
        Ok(())
    }

    fn remove_user(&self, session: SessionId) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.outbox.remove(&session);
        state
            .users
            .remove(&session)
            .map(|_| ())
            .ok_or(GatewayError::UnknownUser(session))
    }

    fn send_character_states(&self, batch: &[CharacterStateEntry]) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        for entry in batch {
            let s = &entry.state;
            let frame = build_character_state(
                s.character,
                s.sequence,
                s.transform.position,
                s.transform.facing,
            )
            .finish();
            for observer in &entry.observers {
                if !state.users.contains_key(observer) {
                    continue;
                }
                state.outbox.entry(*observer).or_default().push(frame.clone());
            }
        }
        Ok(())
    }

    fn send_ping(&self, session: SessionId, nonce: u32) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&session) {
            return Err(GatewayError::UnknownUser(session));
        }
        state
            .outbox
            .entry(session)
            .or_default()
            .push(build_ping(nonce).finish());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Transform;
    use crate::movement::CharacterState;
    use protocol::BinaryReader;

    #[test]
    fn test_removed_entity_rejects_late_updates() {
        let gw = LocalGateway::new(1, 50.0);
        gw.set_entity_position(9, Vec3::ZERO, 1).unwrap();
        gw.remove_entity(9).unwrap();

        assert_eq!(gw.remove_entity(9), Err(GatewayError::UnknownEntity(9)));
        assert!(matches!(
            gw.set_entity_position(9, Vec3::ONE, 1),
            Err(GatewayError::Rejected(_))
        ));
        assert_eq!(gw.removed_entities(), vec![9]);
        assert_eq!(gw.tracked_entities(), 0);
    }

    #[test]
    fn test_removal_history_is_bounded() {
        let gw = LocalGateway::new(1, 50.0);
        let cycles = REMOVED_HISTORY as u32 * 2 + 10;
        for id in 1..=cycles {
            gw.set_entity_position(id, Vec3::ZERO, 1).unwrap();
            gw.remove_entity(id).unwrap();
        }

        let removed = gw.removed_entities();
        assert_eq!(removed.len(), REMOVED_HISTORY);
        assert_eq!(removed.last(), Some(&cycles));
        assert_eq!(gw.tracked_entities(), 0);
        assert!(gw.set_entity_variables(cycles, Bytes::new()).is_err());
    }

    #[test]
    fn test_wrong_room_rejected() {
        let gw = LocalGateway::new(1, 50.0);
        assert!(gw.set_user_position(5, Vec3::ZERO, 2).is_err());
        assert!(gw.set_entity_position(5, Vec3::ZERO, 2).is_err());
    }

    #[test]
    fn test_proximity_uses_planar_distance() {
        let gw = LocalGateway::new(1, 10.0);
        gw.set_user_position(1, Vec3::new(0.0, 0.0, 0.0), 1).unwrap();
        gw.set_user_position(2, Vec3::new(6.0, 100.0, 8.0), 1).unwrap();
        gw.set_user_position(3, Vec3::new(20.0, 0.0, 0.0), 1).unwrap();
        assert_eq!(gw.proximity_list(Vec3::ZERO), vec![1, 2]);
    }

    #[test]
    fn test_character_states_reach_known_observers() {
        let gw = LocalGateway::new(1, 10.0);
        gw.set_user_position(1, Vec3::ZERO, 1).unwrap();
        let entry = CharacterStateEntry {
            state: CharacterState {
                character: 4,
                session: 1,
                sequence: 12,
                transform: Transform {
                    position: Vec3::new(1.0, 0.0, 2.0),
                    velocity: 8.0,
                    facing: 0.0,
                },
            },
            observers: vec![1, 77],
        };
        gw.send_character_states(&[entry]).unwrap();

        let frames = gw.take_outbox(1);
        assert_eq!(frames.len(), 1);
        let mut r = BinaryReader::new(frames[0].clone());
        assert_eq!(r.get_u8().unwrap(), 0x73);
        assert_eq!(r.get_u32().unwrap(), 4);
        assert_eq!(r.get_u32().unwrap(), 12);
        assert!(gw.take_outbox(77).is_empty());
        assert!(gw.take_outbox(1).is_empty());
    }

    #[test]
    fn test_ping_requires_known_user() {
        let gw = LocalGateway::new(1, 10.0);
        assert_eq!(gw.send_ping(3, 1), Err(GatewayError::UnknownUser(3)));
        gw.set_user_position(3, Vec3::ZERO, 1).unwrap();
        gw.send_ping(3, 1).unwrap();
        assert_eq!(gw.take_outbox(3).len(), 1);
        gw.remove_user(3).unwrap();
        assert_eq!(gw.remove_user(3), Err(GatewayError::UnknownUser(3)));
    }
}
