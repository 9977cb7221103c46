//! Server -> Client packet building.

use super::ServerOpcode;
use crate::{BinaryWriter, Position};

/// Build a CharacterState packet (0x73).
///
/// Sent to the owner (and observers in range) after one of its inputs was
/// simulated; `sequence` lets the client reconcile its prediction buffer.
pub fn build_character_state(
    entity_id: u32,
    sequence: u32,
    position: Position,
    facing: f32,
) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(25);
    w.put_u8(ServerOpcode::CharacterState as u8);
    w.put_u32(entity_id);
    w.put_u32(sequence);
    w.put_f32(position.x);
    w.put_f32(position.y);
    w.put_f32(position.z);
    w.put_f32(facing);
    w
}

/// Build a Ping packet (0x70).
pub fn build_ping(nonce: u32) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(5);
    w.put_u8(ServerOpcode::Ping as u8);
    w.put_u32(nonce);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryReader;

    #[test]
    fn test_character_state_layout() {
        let bytes = build_character_state(3, 17, Position::new(1.0, 0.0, 2.0), 90.0).finish();
        assert_eq!(bytes.len(), 25);
        let mut r = BinaryReader::new(bytes);
        assert_eq!(r.get_u8().unwrap(), 0x73);
        assert_eq!(r.get_u32().unwrap(), 3);
        assert_eq!(r.get_u32().unwrap(), 17);
        assert_eq!(r.get_f32().unwrap(), 1.0);
        assert_eq!(r.get_f32().unwrap(), 0.0);
        assert_eq!(r.get_f32().unwrap(), 2.0);
        assert_eq!(r.get_f32().unwrap(), 90.0);
    }

    #[test]
    fn test_ping_carries_nonce() {
        let mut r = BinaryReader::new(build_ping(0xABCD).finish());
        assert_eq!(r.get_u8().unwrap(), ServerOpcode::Ping as u8);
        assert_eq!(r.get_u32().unwrap(), 0xABCD);
    }
}
