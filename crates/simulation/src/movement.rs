//! Character movement integration.

use crate::entity::{Character, EntityId, Input, SessionId, Transform};
use glam::Vec2;

/// Authoritative state after one input, replicated to the owner and observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterState {
    pub character: EntityId,
    pub session: SessionId,
    /// Input sequence this state answers, for client reconciliation.
    pub sequence: u32,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementOutcome {
    pub transform: Transform,
    pub state: CharacterState,
}

/// Apply one input for `dt` seconds. Does not mutate the character.
///
/// The turn is applied first, then the `(horizontal, vertical)` move vector
/// is taken relative to the new facing and normalised so diagonals are not
/// faster.
pub fn integrate(character: &Character, input: &Input, dt: f32, turn_rate_deg: f32) -> MovementOutcome {
    let mut transform = character.transform;

    let turn = input.rotation.signum() as f32 * turn_rate_deg * dt;
    transform.facing = (transform.facing + turn).rem_euclid(360.0);

    let (sin, cos) = transform.facing.to_radians().sin_cos();
    let forward = Vec2::new(sin, cos);
    let right = Vec2::new(cos, -sin);
    let wish = forward * input.vertical.signum() as f32 + right * input.horizontal.signum() as f32;
    let step = wish.normalize_or_zero() * transform.velocity * dt;
    transform.position.x += step.x;
    transform.position.z += step.y;

    MovementOutcome {
        transform,
        state: CharacterState {
            character: character.id,
            session: character.session,
            sequence: input.sequence,
            transform,
        },
    }
}
