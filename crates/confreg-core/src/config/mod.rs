//! Versioned config documents and their reference graph

pub mod hash;
pub mod manager;
pub mod propagation;
pub mod refs;

// vim: ts=4
