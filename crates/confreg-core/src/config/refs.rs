//! Reference declarations inside config documents
//!
//! A declaration is an object whose only key is `$ref`, holding
//! `{"configName", "schemaId", "version"}` where `version` is a positive
//! integer or `"latest"`. Declarations may appear anywhere in a document.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

use confreg_types::config_adapter::{
	ConfigKey, ConfigRefResponse, ConfigReference, MAX_REF_DEPTH, RefVersion,
};

use crate::prelude::*;

const REF_KEY: &str = "$ref";

fn as_declaration(value: &Value) -> Option<&Map<String, Value>> {
	match value {
		Value::Object(obj) if obj.len() == 1 => obj.get(REF_KEY).and_then(Value::as_object),
		_ => None,
	}
}

fn parse_declaration(decl: &Map<String, Value>) -> ClResult<ConfigReference> {
	let field = |name: &str| {
		decl.get(name)
			.and_then(Value::as_str)
			.filter(|s| !s.is_empty())
			.ok_or_else(|| Error::ValidationError(format!("$ref: missing or empty '{}'", name)))
	};
	let config_name = field("configName")?;
	let schema_id = field("schemaId")?;

	let version = match decl.get("version") {
		Some(Value::String(s)) if s == "latest" => RefVersion::Latest,
		Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
			Some(v) if v > 0 => RefVersion::Pinned(v),
			_ => {
				return Err(Error::ValidationError(format!(
					"$ref: invalid version {} for '{}'",
					n, config_name
				)));
			}
		},
		_ => {
			return Err(Error::ValidationError(format!(
				"$ref: version of '{}' must be a positive integer or \"latest\"",
				config_name
			)));
		}
	};

	Ok(ConfigReference::new(config_name, schema_id, version))
}

fn collect(value: &Value, refs: &mut BTreeSet<ConfigReference>) -> ClResult<()> {
	if let Some(decl) = as_declaration(value) {
		refs.insert(parse_declaration(decl)?);
		return Ok(());
	}
	match value {
		Value::Object(obj) => {
			for item in obj.values() {
				collect(item, refs)?;
			}
		}
		Value::Array(items) => {
			for item in items {
				collect(item, refs)?;
			}
		}
		_ => {}
	}
	Ok(())
}

/// Every distinct reference declared in a document, sorted
pub fn extract_refs(config: &Value) -> ClResult<Vec<ConfigReference>> {
	let mut refs = BTreeSet::new();
	collect(config, &mut refs)?;
	Ok(refs.into_iter().collect())
}

// RefCache //
//**********//
/// Resolved reference targets of one operation, keyed by `name::schema::version`
///
/// `latest` references resolve to the entry of the same lineage that is
/// flagged `is_latest`.
#[derive(Debug, Default)]
pub struct RefCache {
	entries: HashMap<String, ConfigRefResponse>,
	latest: HashMap<(Box<str>, Box<str>), String>,
}

impl RefCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an entry unless one with the same key is already present
	pub fn insert_if_absent(&mut self, item: ConfigRefResponse) {
		let key = item.key().cache_key();
		if self.entries.contains_key(&key) {
			return;
		}
		if item.is_latest {
			self.latest.insert((item.config_name.clone(), item.schema_id.clone()), key.clone());
		}
		self.entries.insert(key, item);
	}

	pub fn extend(&mut self, items: impl IntoIterator<Item = ConfigRefResponse>) {
		for item in items {
			self.insert_if_absent(item);
		}
	}

	pub fn get(&self, key: &ConfigKey) -> Option<&ConfigRefResponse> {
		self.entries.get(&key.cache_key())
	}

	pub fn resolve(&self, r: &ConfigReference) -> Option<&ConfigRefResponse> {
		match r.version {
			RefVersion::Pinned(_) => self.entries.get(&r.cache_key()),
			RefVersion::Latest => {
				let key = self.latest.get(&(r.config_name.clone(), r.schema_id.clone()))?;
				self.entries.get(key)
			}
		}
	}

	/// Overwrites the hash of a cached entry, returns false if absent
	pub fn set_hash(&mut self, key: &ConfigKey, hash: Box<str>) -> bool {
		match self.entries.get_mut(&key.cache_key()) {
			Some(entry) => {
				entry.hash = hash;
				true
			}
			None => false,
		}
	}
}

fn inline(value: &Value, cache: &RefCache, depth: u32) -> ClResult<Value> {
	if let Some(decl) = as_declaration(value) {
		let r = parse_declaration(decl)?;
		let target = cache.resolve(&r).ok_or_else(|| Error::ConfigNotFound(r.to_string()))?;
		if depth >= MAX_REF_DEPTH {
			return Err(Error::ValidationError(format!(
				"reference chain through {} is deeper than {}",
				r, MAX_REF_DEPTH
			)));
		}
		return inline(&target.config, cache, depth + 1);
	}

	Ok(match value {
		Value::Object(obj) => {
			let mut res = Map::with_capacity(obj.len());
			for (k, v) in obj {
				res.insert(k.clone(), inline(v, cache, depth)?);
			}
			Value::Object(res)
		}
		Value::Array(items) => {
			Value::Array(items.iter().map(|v| inline(v, cache, depth)).collect::<ClResult<_>>()?)
		}
		other => other.clone(),
	})
}

/// Replaces every reference declaration with the body of its target,
/// recursively. `cache` must hold the dependency closure of `config`.
pub fn dereference(config: &Value, cache: &RefCache) -> ClResult<Value> {
	inline(config, cache, 0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn entry(name: &str, version: u32, config: Value, is_latest: bool) -> ConfigRefResponse {
		ConfigRefResponse {
			config_name: name.into(),
			schema_id: "s".into(),
			version,
			config,
			hash: format!("h-{}-{}", name, version).into(),
			is_latest,
		}
	}

	#[test]
	fn test_extract_refs() {
		let doc = json!({
			"db": {"$ref": {"configName": "db", "schemaId": "s", "version": 2}},
			"caches": [
				{"$ref": {"configName": "redis", "schemaId": "s", "version": "latest"}},
				{"$ref": {"configName": "db", "schemaId": "s", "version": 2}}
			],
			"plain": {"$ref": "not-a-declaration"},
			"other": {"$ref": {"configName": "x"}, "extra": true}
		});

		let refs = extract_refs(&doc).unwrap();
		assert_eq!(
			refs,
			vec![
				ConfigReference::new("db", "s", RefVersion::Pinned(2)),
				ConfigReference::new("redis", "s", RefVersion::Latest),
			]
		);
	}

	#[test]
	fn test_extract_refs_rejects_bad_versions() {
		for version in [json!(0), json!(-1), json!("2"), json!(null), json!(1.5)] {
			let doc = json!({"a": {"$ref": {"configName": "db", "schemaId": "s", "version": version}}});
			assert!(matches!(extract_refs(&doc), Err(Error::ValidationError(_))));
		}

		let doc = json!({"$ref": {"configName": "", "schemaId": "s", "version": 1}});
		assert!(matches!(extract_refs(&doc), Err(Error::ValidationError(_))));
	}

	#[test]
	fn test_cache_resolves_latest() {
		let mut cache = RefCache::new();
		cache.extend([entry("db", 1, json!({}), false), entry("db", 2, json!({}), true)]);

		let latest = cache.resolve(&ConfigReference::new("db", "s", RefVersion::Latest));
		assert_eq!(latest.map(|e| e.version), Some(2));
		let pinned = cache.resolve(&ConfigReference::new("db", "s", RefVersion::Pinned(1)));
		assert_eq!(pinned.map(|e| e.version), Some(1));
		assert!(cache.resolve(&ConfigReference::new("db", "other", RefVersion::Latest)).is_none());
	}

	#[test]
	fn test_cache_keeps_existing_entries() {
		let mut cache = RefCache::new();
		cache.insert_if_absent(entry("db", 1, json!({}), true));
		let key = ConfigKey::new("db", "s", 1);
		assert!(cache.set_hash(&key, "fresh".into()));

		cache.insert_if_absent(entry("db", 1, json!({}), true));
		assert_eq!(cache.get(&key).map(|e| e.hash.as_ref()), Some("fresh"));
		assert!(!cache.set_hash(&ConfigKey::new("db", "s", 9), "x".into()));
	}

	#[test]
	fn test_dereference_nested() {
		let mut cache = RefCache::new();
		cache.extend([
			entry("leaf", 1, json!({"port": 5432}), true),
			entry(
				"mid",
				3,
				json!({"db": {"$ref": {"configName": "leaf", "schemaId": "s", "version": "latest"}}}),
				true,
			),
		]);

		let doc = json!({
			"name": "svc",
			"deps": [{"$ref": {"configName": "mid", "schemaId": "s", "version": 3}}]
		});
		assert_eq!(
			dereference(&doc, &cache).unwrap(),
			json!({"name": "svc", "deps": [{"db": {"port": 5432}}]})
		);
	}

	#[test]
	fn test_dereference_missing_target() {
		let doc = json!({"db": {"$ref": {"configName": "db", "schemaId": "s", "version": 1}}});
		assert!(matches!(dereference(&doc, &RefCache::new()), Err(Error::ConfigNotFound(_))));
	}

	#[test]
	fn test_dereference_cycle_is_bounded() {
		let mut cache = RefCache::new();
		cache.insert_if_absent(entry(
			"loop",
			1,
			json!({"self": {"$ref": {"configName": "loop", "schemaId": "s", "version": "latest"}}}),
			true,
		));

		let doc = json!({"$ref": {"configName": "loop", "schemaId": "s", "version": 1}});
		assert!(matches!(dereference(&doc, &cache), Err(Error::ValidationError(_))));
	}
}

// vim: ts=4
