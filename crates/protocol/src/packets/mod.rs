//! Packet definitions for the room protocol.
//!
//! This module contains both client->server and server->client packet types.

mod client;
mod server;

pub use client::*;
pub use server::*;

/// Opcodes for client -> server packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOpcode {
    /// Movement/aim input.
    Input = 0x69,
    /// Reply to a latency probe.
    Pong = 0x70,
}

/// Opcodes for server -> client packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOpcode {
    /// Latency probe carrying a nonce to echo back.
    Ping = 0x70,
    /// Authoritative character state after an input was simulated.
    CharacterState = 0x73,
}
