pub use confreg_core::prelude::*;

// vim: ts=4
