//! Authoritative simulation core for one real-time action room.
//!
//! A [`Room`](room::Room) owns fixed-capacity pools of characters and
//! projectiles, consumes client inputs once per tick, compensates shots for
//! network delay and reports everything players should see through a
//! [`ReplicationGateway`](gateway::ReplicationGateway).

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod latency;
pub mod movement;
pub mod pool;
pub mod room;
pub mod scheduler;
pub mod weapon;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::SimError;
pub use gateway::{LocalGateway, ReplicationGateway};
pub use room::{Room, RoomRuntime, TickReport};
pub use scheduler::TaskScheduler;
