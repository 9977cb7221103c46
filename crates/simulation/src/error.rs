//! Room-level error type.

use crate::entity::SessionId;
use crate::gateway::GatewayError;
use crate::latency::ProbeError;
use crate::pool::PoolError;
use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("replication gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("malformed packet: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("session {0} already has a character")]
    AlreadyJoined(SessionId),

    #[error("session {0} has no character in this room")]
    UnknownSession(SessionId),

    #[error("pong {nonce} from session {session} ignored: {reason}")]
    UnexpectedPong {
        session: SessionId,
        nonce: u32,
        reason: ProbeError,
    },
}

impl SimError {
    /// The gateway refused a call; the core itself is consistent.
    pub fn is_collaborator(&self) -> bool {
        matches!(self, SimError::Gateway(_))
    }

    /// A handle was used outside its lifetime: a lifecycle bug in the core.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, SimError::Pool(PoolError::InvalidHandle { .. }))
    }

    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, SimError::Pool(PoolError::Exhausted { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::EntityKind;

    #[test]
    fn test_collaborator_failures_are_distinguishable() {
        let gateway: SimError = GatewayError::UnknownEntity(4).into();
        assert!(gateway.is_collaborator());
        assert!(!gateway.is_invalid_handle());

        let exhausted: SimError = PoolError::Exhausted {
            kind: EntityKind::Projectile,
            capacity: 5,
        }
        .into();
        assert!(exhausted.is_pool_exhausted());
        assert!(!exhausted.is_collaborator());
        assert_eq!(exhausted.to_string(), "projectile pool exhausted (capacity 5)");
    }
}
