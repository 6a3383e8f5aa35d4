//! Unified error types for the pipeline.
//!
//! Every failure the pipeline can observe maps onto one coded variant:
//! - PARSE_001-002: Malformed or out-of-range measurement payloads
//! - STORE_001-002: Durable store write / aggregate query failures
//! - CONN_001: Observer connection write failures
//! - BUS_001: Event bus publish / fetch failures
//!
//! None of these are fatal once the process is running.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes surfaced in logs and HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// PARSE_001: Payload is not a well-formed measurement
    MalformedPayload,
    /// PARSE_002: A field is outside the storage column range
    OutOfRange,
    /// STORE_001: Bulk insert failed, batch lost
    StoreWrite,
    /// STORE_002: Rolling aggregate query failed
    StoreQuery,
    /// CONN_001: Write to an observer connection failed
    ConnectionWrite,
    /// BUS_001: Event bus unavailable
    Bus,
    /// SER_001: Outbound serialization failed
    Serialization,
    /// CONFIG_001: Invalid configuration
    Config,
    /// INTERNAL_001
    Internal,
}

impl ErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "PARSE_001",
            Self::OutOfRange => "PARSE_002",
            Self::StoreWrite => "STORE_001",
            Self::StoreQuery => "STORE_002",
            Self::ConnectionWrite => "CONN_001",
            Self::Bus => "BUS_001",
            Self::Serialization => "SER_001",
            Self::Config => "CONFIG_001",
            Self::Internal => "INTERNAL_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedPayload | Self::OutOfRange => 400,
            Self::Bus => 503,
            Self::ConnectionWrite => 502,
            Self::StoreWrite
            | Self::StoreQuery
            | Self::Serialization
            | Self::Config
            | Self::Internal => 500,
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("store query failed: {0}")]
    StoreQuery(String),

    #[error("connection write failed: {0}")]
    ConnectionWrite(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    pub fn store_query(msg: impl Into<String>) -> Self {
        Self::StoreQuery(msg.into())
    }

    pub fn connection_write(msg: impl Into<String>) -> Self {
        Self::ConnectionWrite(msg.into())
    }

    pub fn bus(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The coded classification of this error.
    pub fn kind(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::MalformedPayload,
            Self::Validation(_) => ErrorCode::OutOfRange,
            Self::StoreWrite(_) => ErrorCode::StoreWrite,
            Self::StoreQuery(_) => ErrorCode::StoreQuery,
            Self::ConnectionWrite(_) => ErrorCode::ConnectionWrite,
            Self::Bus(_) => ErrorCode::Bus,
            Self::Serialization(_) => ErrorCode::Serialization,
            Self::Config(_) => ErrorCode::Config,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        self.kind().code()
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// True for payload problems that are dropped and counted, never retried.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}
