//! Client -> Server packet parsing.

use super::ClientOpcode;
use crate::{BinaryReader, BinaryWriter, ProtocolError};

/// One sampled client input as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPacket {
    /// Client-side input id, echoed back in character states.
    pub sequence: u32,
    /// Forward/backward axis in `{-1, 0, 1}`.
    pub vertical: i8,
    /// Strafe axis in `{-1, 0, 1}`.
    pub horizontal: i8,
    /// Turn direction in `{-1, 0, 1}`.
    pub rotation: i8,
    /// Aim in tenths of a degree, or [`crate::NO_AIM`].
    pub aim: i16,
    /// Client timestamp (ms since the Unix epoch) when the input was issued.
    pub request_time_ms: u64,
}

/// Parsed client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Input(InputPacket),
    Pong { nonce: u32 },
}

fn axis(reader: &mut BinaryReader) -> Result<i8, ProtocolError> {
    let v = reader.get_i8()?;
    if !(-1..=1).contains(&v) {
        return Err(ProtocolError::InvalidAxis(v));
    }
    Ok(v)
}

impl ClientPacket {
    /// Parse a client packet from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(data.to_vec());
        let opcode = reader.get_u8()?;

        let packet = match opcode {
            x if x == ClientOpcode::Input as u8 => ClientPacket::Input(InputPacket {
                sequence: reader.get_u32()?,
                vertical: axis(&mut reader)?,
                horizontal: axis(&mut reader)?,
                rotation: axis(&mut reader)?,
                aim: reader.get_i16()?,
                request_time_ms: reader.get_u64()?,
            }),
            x if x == ClientOpcode::Pong as u8 => ClientPacket::Pong {
                nonce: reader.get_u32()?,
            },
            other => return Err(ProtocolError::InvalidOpcode(other)),
        };

        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(reader.remaining()));
        }
        Ok(packet)
    }
}

/// Build an Input packet (client side, also used by test harnesses).
pub fn build_input(input: &InputPacket) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(18);
    w.put_u8(ClientOpcode::Input as u8);
    w.put_u32(input.sequence);
    w.put_i8(input.vertical);
    w.put_i8(input.horizontal);
    w.put_i8(input.rotation);
    w.put_i16(input.aim);
    w.put_u64(input.request_time_ms);
    w
}

/// Build a Pong packet echoing a probe nonce.
pub fn build_pong(nonce: u32) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(5);
    w.put_u8(ClientOpcode::Pong as u8);
    w.put_u32(nonce);
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let sent = InputPacket {
            sequence: 42,
            vertical: 1,
            horizontal: -1,
            rotation: 0,
            aim: 900,
            request_time_ms: 1_000,
        };
        let bytes = build_input(&sent).finish();
        assert_eq!(ClientPacket::parse(&bytes), Ok(ClientPacket::Input(sent)));
    }

    #[test]
    fn test_axis_out_of_range_rejected() {
        let mut w = BinaryWriter::new();
        w.put_u8(ClientOpcode::Input as u8);
        w.put_u32(1);
        w.put_i8(3);
        let bytes = w.finish();
        assert_eq!(ClientPacket::parse(&bytes), Err(ProtocolError::InvalidAxis(3)));
    }

    #[test]
    fn test_unknown_opcode_and_truncation() {
        assert_eq!(ClientPacket::parse(&[0x00]), Err(ProtocolError::InvalidOpcode(0x00)));
        assert_eq!(ClientPacket::parse(&[]), Err(ProtocolError::UnexpectedEof));
        assert_eq!(
            ClientPacket::parse(&[ClientOpcode::Pong as u8, 1]),
            Err(ProtocolError::UnexpectedEof)
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = build_pong(9).finish().to_vec();
        bytes.push(0);
        assert_eq!(ClientPacket::parse(&bytes), Err(ProtocolError::TrailingBytes(1)));
    }
}
