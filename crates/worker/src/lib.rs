//! Batching ingest worker.
//!
//! Consumes measurement payloads from the bus, buffers them, and writes
//! them to the store in bulk when the buffer fills or the flush timer
//! fires. Failed batches are dropped (or retried, when configured), never
//! requeued.

pub mod buffer;
pub mod config;
pub mod ingest;
pub mod scheduler;

pub use buffer::BatchBuffer;
pub use config::IngestConfig;
pub use ingest::*;
pub use scheduler::*;
