//! Game API Service
//!
//! HTTP and WebSocket API for the crash game. Serves game state, takes
//! bets, and streams live round events to connected clients.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
