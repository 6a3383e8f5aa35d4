//! Core types, validation, and errors for the netpulse pipeline.

pub mod aggregate;
pub mod error;
pub mod limits;
pub mod measurement;
pub mod message;
pub mod publish;

pub use aggregate::*;
pub use error::{Error, ErrorCode, Result};
pub use measurement::*;
pub use message::*;
pub use publish::PublishPayload;
