//! # httpkv
//!
//! A durable key-value store served over HTTP:
//! - Write-Ahead Logging (WAL) for durability, one fsynced frame per commit
//! - Crash recovery from checkpoint + WAL replay
//! - Single-writer/multi-reader transactions
//! - Every call authorized by a shared secret
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 HTTP Server (axum)                           │
//! │       GET/PUT /api/{credential}/{key}, graceful drain        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Request Handler                             │
//! │        access control → key → body → one transaction        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Store (read / write)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ Checkpoint  │
//!                           │  (data.db)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod store;
pub mod auth;
pub mod handler;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use auth::{AccessControl, Credential};
pub use config::{Config, BUCKET_NAME};
pub use engine::Engine;
pub use error::{KvError, Result};
pub use handler::{RequestError, RequestHandler};
pub use network::{Phase, Server};
pub use store::{BucketStore, MemoryStore, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of httpkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
