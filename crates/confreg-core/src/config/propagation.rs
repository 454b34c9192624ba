//! Hash Propagation Engine
//!
//! When a config changes, every config that references it (directly or
//! transitively) has a stale hash. The engine walks the ancestors level by
//! level: the first level are the direct referrers of the changed config,
//! every later level the direct referrers of the configs whose hash changed
//! in the level before. A level that changes nothing ends the walk.
//!
//! The ancestor set is loaded once. Reference targets are resolved through a
//! [`RefCache`] private to the run, filled by batch fetches and updated in
//! place whenever a hash is recomputed, so later levels see the new hashes.

use serde::Serialize;
use tracing::Instrument;

use confreg_types::config_adapter::{
	AncestorConfig, ConfigAdapter, ConfigKey, ConfigRefResponse, ConfigReference, HashUpdate,
	MAX_REF_DEPTH,
};

use super::hash::compute_hash;
use super::refs::RefCache;
use crate::prelude::*;

/// Outcome of one propagation run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
	/// Persisted hash changes, in the order they were computed
	pub updates: Vec<HashUpdate>,
	/// Every config whose hash was recomputed, in processing order
	pub evaluated: Vec<ConfigKey>,
}

/// A config whose hash is known to be current, with its `is_latest` flag
type Frontier = Vec<(ConfigKey, bool)>;

/// Direct referrers of any frontier member, in ancestor order
fn level_parents<'a>(ancestors: &'a [AncestorConfig], frontier: &Frontier) -> Vec<&'a AncestorConfig> {
	ancestors
		.iter()
		.filter(|a| {
			a.refs.iter().any(|r| frontier.iter().any(|(key, is_latest)| r.targets(key, *is_latest)))
		})
		.collect()
}

/// Union of the parents' declared refs, deduplicated by cache key
fn collect_refs_from_parents(parents: &[&AncestorConfig]) -> Vec<ConfigReference> {
	let mut seen = std::collections::HashSet::new();
	let mut refs = Vec::new();
	for parent in parents {
		for r in &parent.refs {
			if seen.insert(r.cache_key()) {
				refs.push(r.clone());
			}
		}
	}
	refs
}

/// Batch-fetches the refs the cache cannot resolve yet
async fn fetch_and_cache_refs_for_parents(
	adapter: &dyn ConfigAdapter,
	refs: &[ConfigReference],
	cache: &mut RefCache,
) -> ClResult<()> {
	let missing: Vec<ConfigReference> =
		refs.iter().filter(|r| cache.resolve(r).is_none()).cloned().collect();
	if missing.is_empty() {
		return Ok(());
	}

	let fetched = adapter.get_config_refs(&missing).await?;
	debug!("fetched {} config(s) for {} unresolved ref(s)", fetched.len(), missing.len());
	cache.extend(fetched);
	Ok(())
}

/// Recomputes the hash of every parent, overwriting changed cache entries
fn calculate_hash_updates_for_parents(
	parents: &[&AncestorConfig],
	cache: &mut RefCache,
	report: &mut PropagationReport,
) -> ClResult<(Vec<HashUpdate>, Frontier)> {
	let mut updates = Vec::new();
	let mut changed = Frontier::new();

	for parent in parents {
		let key = parent.config.key();
		let current = cache.get(&key).map_or_else(|| parent.config.hash.clone(), |e| e.hash.clone());

		let computed = compute_hash(&parent.config.config, &parent.refs, cache)?;
		for r in &computed.unresolved {
			warn!("{}: reference {} does not resolve, left out of hash", key, r);
		}
		report.evaluated.push(key.clone());

		if computed.hash == current {
			continue;
		}

		debug!("{}: hash {} -> {}", key, current, computed.hash);
		cache.set_hash(&key, computed.hash.clone());
		updates.push(HashUpdate {
			config_name: key.config_name.clone(),
			schema_id: key.schema_id.clone(),
			version: key.version,
			hash: computed.hash,
			old_hash: current,
		});
		changed.push((key, parent.config.is_latest));
	}

	Ok((updates, changed))
}

/// Brings the hashes of every config above `changed` up to date.
///
/// `changed` must carry its current (already persisted) hash.
pub async fn propagate(
	adapter: &dyn ConfigAdapter,
	changed: &ConfigRefResponse,
) -> ClResult<PropagationReport> {
	let span = info_span!("propagate", config = %changed.key());
	run(adapter, changed).instrument(span).await
}

async fn run(adapter: &dyn ConfigAdapter, changed: &ConfigRefResponse) -> ClResult<PropagationReport> {
	let root = changed.key();
	let mut report = PropagationReport::default();

	let ancestors = adapter.list_ancestors(&root).await?;
	let Some(deepest) = ancestors.iter().map(|a| a.depth).max() else {
		debug!("no ancestors");
		return Ok(report);
	};
	debug!("{} ancestor(s), up to {} level(s) above", ancestors.len(), deepest);

	let mut cache = RefCache::new();
	cache.insert_if_absent(changed.clone());
	cache.extend(ancestors.iter().map(|a| a.config.clone()));

	let mut frontier: Frontier = vec![(root.clone(), changed.is_latest)];
	let mut level = 0;
	while !frontier.is_empty() {
		if level >= MAX_REF_DEPTH {
			warn!("depth limit of {} levels reached, {} config(s) left", MAX_REF_DEPTH, frontier.len());
			break;
		}
		level += 1;

		let parents = level_parents(&ancestors, &frontier);
		if parents.is_empty() {
			break;
		}

		let refs = collect_refs_from_parents(&parents);
		fetch_and_cache_refs_for_parents(adapter, &refs, &mut cache).await?;
		let (updates, changed_keys) =
			calculate_hash_updates_for_parents(&parents, &mut cache, &mut report)?;

		for update in &updates {
			adapter
				.update_hash(&update.config_name, &update.schema_id, update.version, &update.hash)
				.await?;
		}
		debug!("level {}: {} parent(s), {} changed", level, parents.len(), updates.len());

		report.updates.extend(updates);
		frontier = changed_keys;
	}

	info!(
		"hash propagation done: {} evaluated, {} updated",
		report.evaluated.len(),
		report.updates.len()
	);
	Ok(report)
}

// vim: ts=4
