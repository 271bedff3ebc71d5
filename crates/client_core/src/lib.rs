//! Client core for the concept dashboard: backend configuration, the server-push
//! transport, per-collection entity mirrors, live collections and REST commands.
//!
//! Views depend on this crate only; they never open sockets or issue requests themselves.

pub mod commands;
pub mod config;
pub mod error;
pub mod live;
pub mod mirror;
pub mod transport;

pub use commands::{CommandClient, DashboardApi};
pub use config::{load_config, ClientConfig};
pub use error::{CommandError, ConfigError, DecodeError, TransportError};
pub use live::{EndReason, LiveCollection, SyncEvent};
pub use mirror::{ConceptSnapshot, EntityMirror, PeerSnapshot, ReconcilePolicy, Snapshot};
pub use transport::{RawMessage, Subscription};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
