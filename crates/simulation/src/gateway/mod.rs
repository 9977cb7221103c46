//! Replication gateway seam.
//!
//! The room never talks to clients directly. Everything players see goes
//! through a [`ReplicationGateway`], which owns transport, proximity and
//! serialization. Calls are made outside every room lock.

mod local;

pub use local::LocalGateway;

use crate::entity::{EntityId, RoomId, SessionId};
use crate::movement::CharacterState;
use bytes::Bytes;
use glam::Vec3;
use thiserror::Error;

/// A failure reported by the collaborator, not by the room itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown user {0}")]
    UnknownUser(SessionId),
    #[error("rejected: {0}")]
    Rejected(String),
}

/// One character state and the sessions that should receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterStateEntry {
    pub state: CharacterState,
    pub observers: Vec<SessionId>,
}

pub trait ReplicationGateway: Send + Sync {
    fn set_entity_position(&self, entity: EntityId, position: Vec3, room: RoomId) -> Result<(), GatewayError>;

    /// Publish an encoded variable blob (see [`protocol::ProjectileVariables`]).
    fn set_entity_variables(&self, entity: EntityId, variables: Bytes) -> Result<(), GatewayError>;

    fn remove_entity(&self, entity: EntityId) -> Result<(), GatewayError>;

    /// Sessions close enough to `position` to observe it.
    fn proximity_list(&self, position: Vec3) -> Vec<SessionId>;

    fn set_user_position(&self, session: SessionId, position: Vec3, room: RoomId) -> Result<(), GatewayError>;

    fn remove_user(&self, session: SessionId) -> Result<(), GatewayError>;

    /// Deliver one tick's character states, in order.
    fn send_character_states(&self, batch: &[CharacterStateEntry]) -> Result<(), GatewayError>;

    fn send_ping(&self, session: SessionId, nonce: u32) -> Result<(), GatewayError>;
}
