//! Error types returned by the public api.
pub mod connection;
pub mod server;
