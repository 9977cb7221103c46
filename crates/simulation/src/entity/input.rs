//! Client inputs and the per-character input buffer.

use glam::Vec2;
use protocol::packets::InputPacket;
use std::collections::VecDeque;

/// Aim in tenths of a degree, clockwise from +z. `-1` means "not aiming".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AimAngle(i16);

impl AimAngle {
    pub const NONE: AimAngle = AimAngle(protocol::NO_AIM);

    #[inline]
    pub fn from_tenths(tenths: i16) -> Self {
        Self(tenths)
    }

    #[inline]
    pub fn tenths(self) -> i16 {
        self.0
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Unit planar direction `(x, z)` for this aim.
    pub fn direction(self) -> Vec2 {
        let radians = (self.0 as f32 / 10.0).to_radians();
        Vec2::new(radians.sin(), radians.cos())
    }
}

impl Default for AimAngle {
    fn default() -> Self {
        Self::NONE
    }
}

/// One movement/aim command, consumed at most once by the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Input {
    pub sequence: u32,
    pub vertical: i8,
    pub horizontal: i8,
    pub rotation: i8,
    pub aim: AimAngle,
    /// Client clock when the command was issued (ms since the Unix epoch).
    pub request_time_ms: u64,
}

impl From<InputPacket> for Input {
    fn from(p: InputPacket) -> Self {
        Self {
            sequence: p.sequence,
            vertical: p.vertical,
            horizontal: p.horizontal,
            rotation: p.rotation,
            aim: AimAngle::from_tenths(p.aim),
            request_time_ms: p.request_time_ms,
        }
    }
}

/// Bounded queue of inputs waiting for the next tick.
///
/// Only the newest input is ever simulated; older ones are stale by the
/// time a tick runs and are dropped.
#[derive(Debug, Default)]
pub struct InputBuffer {
    inputs: VecDeque<Input>,
    capacity: usize,
}

impl InputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inputs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Resize in place, keeping the allocation when it is already large enough.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.inputs.clear();
        self.inputs.reserve(capacity);
    }

    /// Queue an input. Returns the input evicted to make room, if any.
    pub fn push(&mut self, input: Input) -> Option<Input> {
        if self.capacity == 0 {
            return Some(input);
        }
        let evicted = if self.inputs.len() >= self.capacity {
            self.inputs.pop_front()
        } else {
            None
        };
        self.inputs.push_back(input);
        evicted
    }

    /// Take the most recently queued input and discard everything older.
    pub fn take_latest(&mut self) -> Option<Input> {
        let latest = self.inputs.pop_back();
        self.inputs.clear();
        latest
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }
}
