//! Broadcast server.
//!
//! Keeps the registry of live observer connections and pushes every
//! measurement, plus a periodic rolling aggregate, to all of them. A slow
//! or failed observer is evicted; it never holds up the others.

pub mod aggregate;
pub mod config;
pub mod registry;
pub mod server;
pub mod transport;

pub use aggregate::run_aggregate_pusher;
pub use config::BroadcastConfig;
pub use registry::*;
pub use server::*;
pub use transport::ObserverTransport;
