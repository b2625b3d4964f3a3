//! Transaction-signing reverse proxy library.
//!
//! Proxies an upstream API, signing the transactions it returns for a fixed
//! set of paths and tracking account nonces on the home and side ledgers.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod nonce;
pub mod observability;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
