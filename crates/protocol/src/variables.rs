//! Replicated projectile variables.
//!
//! A projectile is published once with its full variable set and then only
//! moves; clients interpolate between departure and destination by age. The
//! age field is republished periodically to correct drift.

use crate::{BinaryReader, BinaryWriter, ProtocolError};
use bytes::Bytes;

/// Encoded size: one tag byte plus six floats.
pub const PROJECTILE_VARIABLES_LEN: usize = 1 + 6 * 4;

/// Field set of the projectile variable blob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileVariables {
    /// `t`: projectile type tag.
    pub kind: u8,
    /// `x`: departure x.
    pub departure_x: f32,
    /// `z`: departure z.
    pub departure_z: f32,
    /// `l`: destination x.
    pub destination_x: f32,
    /// `u`: destination z.
    pub destination_z: f32,
    /// `a`: current age in seconds.
    pub age: f32,
    /// `m`: maximum age in seconds.
    pub max_age: f32,
}

impl ProjectileVariables {
    /// Encode in `t, x, z, l, u, a, m` order.
    pub fn encode(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(PROJECTILE_VARIABLES_LEN);
        w.put_u8(self.kind);
        w.put_f32(self.departure_x);
        w.put_f32(self.departure_z);
        w.put_f32(self.destination_x);
        w.put_f32(self.destination_z);
        w.put_f32(self.age);
        w.put_f32(self.max_age);
        w.finish()
    }

    pub fn decode(data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let mut r = BinaryReader::new(data);
        let vars = Self {
            kind: r.get_u8()?,
            departure_x: r.get_f32()?,
            departure_z: r.get_f32()?,
            destination_x: r.get_f32()?,
            destination_z: r.get_f32()?,
            age: r.get_f32()?,
            max_age: r.get_f32()?,
        };
        if r.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(r.remaining()));
        }
        Ok(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_field_order() {
        let vars = ProjectileVariables {
            kind: 2,
            departure_x: 1.0,
            departure_z: 2.0,
            destination_x: 3.0,
            destination_z: 4.0,
            age: 0.5,
            max_age: 10.0,
        };
        let bytes = vars.encode();
        assert_eq!(bytes.len(), PROJECTILE_VARIABLES_LEN);
        assert_eq!(bytes[0], 2);
        // `a` sits right before `m` at the tail.
        assert_eq!(&bytes[17..21], &0.5f32.to_le_bytes());
        assert_eq!(ProjectileVariables::decode(bytes).unwrap(), vars);
    }

    #[test]
    fn test_truncated_blob() {
        let bytes = Bytes::from_static(&[0u8; 10]);
        assert_eq!(
            ProjectileVariables::decode(bytes),
            Err(ProtocolError::UnexpectedEof)
        );
    }
}
