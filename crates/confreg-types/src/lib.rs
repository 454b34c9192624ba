//! Shared types, adapter traits, and core utilities for the confreg registry.
//!
//! This crate contains the foundational types that are shared between the
//! core managers, the HTTP crate and all adapter implementations. Keeping them
//! in a separate crate lets adapters compile without pulling in the managers.

pub mod config_adapter;
pub mod error;
pub mod hasher;
pub mod lock_adapter;
pub mod prelude;
pub mod schema_manager;
pub mod types;

// vim: ts=4
