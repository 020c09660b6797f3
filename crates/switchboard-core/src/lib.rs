//! # switchboard-core
//!
//! Real-time connection fan-out.
//!
//! - [`registry::ConnectionRegistry`]: which live connections belong to which peer
//! - [`router::DeliveryRouter`]: targeted and broadcast delivery with per-connection
//!   failure isolation
//! - [`lifecycle::SessionController`]: accept → register → receive loop →
//!   deregister → presence, one task per connection
//! - [`transport`]: the `Connection` / `FrameSource` / `Transport` capability traits
//!   every transport kind implements
//! - [`memory`]: an in-process transport used by tests and embedders

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod payload;
pub mod policy;
pub mod registry;
pub mod router;
pub mod transport;

pub use errors::{AcceptError, ReadError, WriteError};
pub use ids::{ConnectionId, PeerId};
pub use lifecycle::{SessionController, SessionEnd, SessionState, SessionSummary};
pub use payload::Payload;
pub use policy::{RelayPolicy, SessionPolicy, presence_left_message};
pub use registry::{ConnectionRegistry, Departure, Registration};
pub use router::{DeliveryReport, DeliveryRouter};
pub use transport::{Accepted, Connection, FrameSource, Transport};
