//! HTTP and WebSocket surface for the measurement pipeline.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
