//! Network Module
//!
//! HTTP surface and service lifecycle.
//!
//! ## Architecture
//! - axum router with one route pair per operation
//! - Each request runs on its own task; storage work on the blocking pool
//! - Graceful shutdown with a bounded drain

mod routes;
mod server;

pub use routes::router;
pub use server::{shutdown_signal, Phase, Server};
