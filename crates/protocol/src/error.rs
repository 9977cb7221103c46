//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding protocol payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Axis value out of range: {0}")]
    InvalidAxis(i8),

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}
