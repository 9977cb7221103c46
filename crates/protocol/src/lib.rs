//! Shared protocol crate for the simulation room.
//!
//! This crate contains:
//! - Binary reading/writing utilities
//! - Packet definitions and builders
//! - The projectile variable blob replicated through the gateway

mod binary;
mod error;
pub mod packets;
mod variables;

pub use binary::{BinaryReader, BinaryWriter};
pub use error::ProtocolError;
pub use variables::ProjectileVariables;

/// World-space position. `y` is height; the simulation plane is `x`/`z`.
pub type Position = glam::Vec3;

/// Aim angle sentinel meaning "this input carries no shot".
pub const NO_AIM: i16 = -1;
