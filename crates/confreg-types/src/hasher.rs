//! Content hashing for configs. Capable of handling multiple hash versions.
//!
//! A config hash covers the canonical (RFC 8785) serialization of the config
//! body followed by the hashes of every config it references directly. The
//! dependency hashes are sorted before concatenation, so the result does not
//! depend on the order in which references were declared.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::prelude::*;

pub enum Hasher {
	V1(Sha256),
}

impl Hasher {
	pub fn new() -> Self {
		Self::V1(Sha256::new())
	}

	pub fn update(&mut self, data: &[u8]) {
		match self {
			Self::V1(hasher) => hasher.update(data),
		}
	}

	/// Lowercase hex digest
	pub fn finalize(self) -> Box<str> {
		match self {
			Self::V1(hasher) => format!("{:x}", hasher.finalize()).into(),
		}
	}
}

impl Default for Hasher {
	fn default() -> Self {
		Self::new()
	}
}

/// Key-order independent JSON serialization
pub fn canonical_json(value: &Value) -> ClResult<String> {
	serde_jcs::to_string(value).map_err(|err| {
		warn!("canonical JSON serialization failed: {}", err);
		Error::Parse
	})
}

pub fn hash(data: &[u8]) -> Box<str> {
	let mut hasher = Hasher::new();
	hasher.update(data);
	hasher.finalize()
}

/// Hash of a config body combined with the hashes of its direct references
pub fn config_hash<'a>(
	config: &Value,
	dependency_hashes: impl IntoIterator<Item = &'a str>,
) -> ClResult<Box<str>> {
	let mut deps: Vec<&str> = dependency_hashes.into_iter().collect();
	deps.sort_unstable();

	let mut hasher = Hasher::new();
	hasher.update(canonical_json(config)?.as_bytes());
	for dep in deps {
		hasher.update(dep.as_bytes());
	}
	Ok(hasher.finalize())
}


// vim: ts=4
