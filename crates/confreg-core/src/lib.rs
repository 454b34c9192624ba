//! Core services of the confreg configuration registry.
//!
//! The services here hold no storage of their own. They work against the
//! adapter traits of `confreg-types` and are assembled once at start-up into
//! an [`AppState`].

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod lock;
pub mod prelude;
pub mod schema;

pub use app::{App, AppState};
pub use config::manager::ConfigManager;
pub use lock::manager::{LockManager, LockOutcome};
pub use schema::manager::FsSchemaManager;

// vim: ts=4
