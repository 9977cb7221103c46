//! Player-controlled character.

use super::{EntityId, InputBuffer, SessionId};
use crate::latency::LatencyState;
use crate::pool::Poolable;
use crate::weapon::WeaponState;
use glam::Vec3;

/// Authoritative placement of a character.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Movement speed in units per second.
    pub velocity: f32,
    /// Heading in degrees, clockwise from +z, in `[0, 360)`.
    pub facing: f32,
}

/// One connected player's simulated state.
#[derive(Debug, Default)]
pub struct Character {
    pub id: EntityId,
    /// Owning session. Only meaningful while the slot is active.
    pub session: SessionId,
    pub transform: Transform,
    pub inputs: InputBuffer,
    pub weapon: WeaponState,
    pub latency: LatencyState,
    /// Sequence of the last input simulated for this character.
    pub last_sequence: Option<u32>,
}

impl Character {
    /// Prepare a pooled character for a newly joined session.
    pub fn spawn(
        &mut self,
        id: EntityId,
        session: SessionId,
        position: Vec3,
        velocity: f32,
        cooldown_ms: u64,
        input_capacity: usize,
    ) {
        self.id = id;
        self.session = session;
        self.transform = Transform {
            position,
            velocity,
            facing: 0.0,
        };
        self.inputs.set_capacity(input_capacity);
        self.weapon = WeaponState::new(cooldown_ms);
        self.latency = LatencyState::default();
        self.last_sequence = None;
    }
}

impl Poolable for Character {
    fn reset(&mut self) {
        self.id = 0;
        self.session = 0;
        self.transform = Transform::default();
        // Buffered inputs die with the session; keep the allocation.
        self.inputs.clear();
        self.weapon = WeaponState::default();
        self.latency = LatencyState::default();
        self.last_sequence = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Input;

    #[test]
    fn test_reset_discards_session_state() {
        let mut c = Character::default();
        c.spawn(4, 99, Vec3::new(0.0, 0.0, 2.0), 8.0, 500, 4);
        c.inputs.push(Input::default());
        c.inputs.push(Input::default());
        c.weapon.last_shot_time_ms = Some(1_000);
        c.last_sequence = Some(3);

        c.reset();
        assert_eq!(c.id, 0);
        assert_eq!(c.session, 0);
        assert!(c.inputs.is_empty());
        assert_eq!(c.weapon.last_shot_time_ms, None);
        assert_eq!(c.last_sequence, None);
        assert_eq!(c.transform, Transform::default());
    }
}
