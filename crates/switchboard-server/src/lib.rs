//! # switchboard-server
//!
//! Axum HTTP + `WebSocket` front end for the switchboard core.
//!
//! - `/ws/{user_id}`: chat relay, every connection of a user sees its frames
//! - `/signal`: WebRTC signaling, frames addressed with `"to"` or fanned out
//! - `/sse-endpoint`: periodic timestamp events
//! - `/health` and `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod sse;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{AppState, SwitchboardServer};
pub use shutdown::ShutdownCoordinator;
