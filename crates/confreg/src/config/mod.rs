//! Config HTTP endpoints

pub mod handler;

// vim: ts=4
