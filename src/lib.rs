//! Crashiq - Item-Staked Crash Game Engine
//!
//! Round-based crash game: players stake inventory items on a shared round,
//! watch the multiplier climb, and cash out before the hidden crash point.
//! A single scheduler task drives the round cadence; bets, escrow, and
//! persistence hang off it through concurrent maps and trait seams.

pub mod api;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod game;
pub mod inventory;
pub mod store;

pub use config::{ConfigLoader, CrashiqConfig};
pub use engine::{GameEngine, GameSnapshot, MyBets};
pub use errors::{CrashiqResult, GameError};
pub use events::{EventBus, GameEvent};
