//! Core game logic: the round board, bet ledger, multiplier curve, round
//! scheduler, and case-opening selector.

pub mod board;
pub mod clock;
pub mod ledger;
pub mod scheduler;
pub mod selector;
pub mod types;
