//! confreg is a hierarchical configuration registry.
//!
//! # Features
//!
//! - Versioned config documents, validated against JSON Schemas
//!     - documents reference each other, pinned to a version or following the latest
//!     - every document carries a hash covering everything it references
//! - Concurrency-limited leases ("locks") with TTL and retry hints
//! - SQLite storage, safe to share between processes

// Re-export shared types and adapter traits from confreg-types
pub use confreg_types::config_adapter;
pub use confreg_types::error;
pub use confreg_types::hasher;
pub use confreg_types::lock_adapter;
pub use confreg_types::schema_manager;
pub use confreg_types::types;

pub use confreg_core as core;

// Local modules
pub mod app;
pub mod config;
pub mod extract;
pub mod lock;
pub mod prelude;
pub mod routes;
pub mod schema;

pub use app::AppBuilder;

// vim: ts=4
