//! Schema lookup and JSON Schema validation

pub mod manager;
pub mod validator;

// vim: ts=4
