//! Weapon cooldown with latency compensation.
//!
//! Cooldown is measured in compensated time: an accepted shot is stamped at
//! the moment the client perceived it (`now - delay - ping`), not when the
//! server got around to processing it. The projectile is spawned already aged
//! by the same amount so it lines up with what the shooter saw.

use crate::entity::{AimAngle, Input};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaponState {
    pub cooldown_ms: u64,
    /// Compensated timestamp of the last accepted shot.
    pub last_shot_time_ms: Option<u64>,
}

/// An accepted shot, not yet committed to the weapon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotPlan {
    pub aim: AimAngle,
    /// Server time minus delivery delay minus ping.
    pub compensated_time_ms: u64,
    /// `now - request_time`, clamped at zero.
    pub delay_ms: u64,
    pub ping_ms: u64,
    /// Initial projectile age in seconds.
    pub execution_delay: f32,
}

impl WeaponState {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_shot_time_ms: None,
        }
    }

    /// Decide whether `input` fires at server time `now_ms`.
    ///
    /// Pure: the cooldown only advances through [`WeaponState::commit`], so a
    /// shot that cannot be spawned does not burn it.
    pub fn evaluate(&self, now_ms: u64, input: &Input, ping_ms: u64) -> Option<ShotPlan> {
        if input.aim.is_none() {
            return None;
        }
        if let Some(last) = self.last_shot_time_ms {
            if now_ms.saturating_sub(last) <= self.cooldown_ms {
                return None;
            }
        }

        // A client clock ahead of ours would make this negative.
        let delay_ms = now_ms.saturating_sub(input.request_time_ms);
        Some(ShotPlan {
            aim: input.aim,
            compensated_time_ms: now_ms.saturating_sub(delay_ms).saturating_sub(ping_ms),
            delay_ms,
            ping_ms,
            execution_delay: delay_ms as f32 / 1000.0 + ping_ms as f32 / 1000.0,
        })
    }

    pub fn commit(&mut self, plan: &ShotPlan) {
        self.last_shot_time_ms = Some(plan.compensated_time_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aimed(request_time_ms: u64) -> Input {
        Input {
            aim: AimAngle::from_tenths(450),
            request_time_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_unaimed_input_never_fires() {
        let weapon = WeaponState::new(500);
        let input = Input {
            request_time_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(weapon.evaluate(1_000, &input, 0), None);
    }

    #[test]
    fn test_compensation_arithmetic() {
        let weapon = WeaponState::new(500);
        let now = 10_000;
        let plan = weapon.evaluate(now, &aimed(now - 120), 80).unwrap();
        assert_eq!(plan.delay_ms, 120);
        assert_eq!(plan.compensated_time_ms, now - 200);
        assert!((plan.execution_delay - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_cooldown_in_compensated_time() {
        let mut weapon = WeaponState::new(500);
        let first = weapon.evaluate(10_000, &aimed(10_000), 0).unwrap();
        weapon.commit(&first);
        assert_eq!(weapon.last_shot_time_ms, Some(10_000));

        assert_eq!(weapon.evaluate(10_300, &aimed(10_300), 0), None);
        // Exactly at the cooldown boundary is still too early.
        assert_eq!(weapon.evaluate(10_500, &aimed(10_500), 0), None);
        assert!(weapon.evaluate(10_600, &aimed(10_600), 0).is_some());
    }

    #[test]
    fn test_evaluate_does_not_consume_cooldown() {
        let weapon = WeaponState::new(500);
        assert!(weapon.evaluate(1_000, &aimed(1_000), 0).is_some());
        assert!(weapon.evaluate(1_010, &aimed(1_010), 0).is_some());
        assert_eq!(weapon.last_shot_time_ms, None);
    }

    #[test]
    fn test_client_clock_ahead_clamps_delay() {
        let weapon = WeaponState::new(500);
        let plan = weapon.evaluate(1_000, &aimed(1_250), 40).unwrap();
        assert_eq!(plan.delay_ms, 0);
        assert_eq!(plan.compensated_time_ms, 960);
        assert!((plan.execution_delay - 0.04).abs() < 1e-6);
    }
}
