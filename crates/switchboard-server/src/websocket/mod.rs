//! WebSocket transport: connection state, heartbeat, writer task and the
//! upgrade handlers.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod writer;
