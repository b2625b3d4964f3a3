//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (buffer body, parse query)
//!     → classify.rs (sign weight by path)
//!     → pipeline.rs (allocate, fetch, sign, submit)
//!     → response.rs (503 envelope on failure) / streamed upstream response
//! ```

pub mod classify;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Orchestrator, Plan};
pub use request::{PendingRequest, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{AppState, HttpServer};
