//! Concurrency-limited leases with retry hints

pub mod manager;

// vim: ts=4
