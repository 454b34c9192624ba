//! Config hash computation against resolved references

use serde_json::Value;

use confreg_types::config_adapter::ConfigReference;
use confreg_types::hasher;

use super::refs::RefCache;
use crate::prelude::*;

/// A computed hash and the references that could not be resolved for it
#[derive(Debug)]
pub struct ComputedHash<'a> {
	pub hash: Box<str>,
	pub unresolved: Vec<&'a ConfigReference>,
}

/// Hashes `config` together with the current hashes of its direct `refs`.
///
/// References missing from `cache` are left out of the hash and reported in
/// [`ComputedHash::unresolved`]; callers decide whether that is fatal.
pub fn compute_hash<'a>(
	config: &Value,
	refs: &'a [ConfigReference],
	cache: &RefCache,
) -> ClResult<ComputedHash<'a>> {
	let mut deps = Vec::with_capacity(refs.len());
	let mut unresolved = Vec::new();
	for r in refs {
		match cache.resolve(r) {
			Some(target) => deps.push(target.hash.as_ref()),
			None => unresolved.push(r),
		}
	}

	let hash = hasher::config_hash(config, deps)?;
	Ok(ComputedHash { hash, unresolved })
}


// vim: ts=4
