//! Adapter that stores versioned configs and the reference edges between them.
//!
//! Besides plain reads and writes it exposes the two graph traversals the
//! registry needs: the dependency closure of a set of references
//! (descendants) and every config that transitively references a given one
//! (ancestors). Both resolve `latest` edges to the row currently flagged
//! `is_latest`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

use crate::prelude::*;

/// Maximum number of reference hops followed by any traversal. Pinned edges
/// cannot form cycles, but `latest` edges can, so every walk stops here.
pub const MAX_REF_DEPTH: u32 = 32;

/// Version recorded for documents validated by this release
pub const CONFIG_SCHEMA_VERSION: &str = "v1";

/// Identity of one config version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigKey {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
}

impl ConfigKey {
	pub fn new(config_name: impl Into<Box<str>>, schema_id: impl Into<Box<str>>, version: u32) -> Self {
		Self { config_name: config_name.into(), schema_id: schema_id.into(), version }
	}

	/// Key used by per-run caches: `name::schema::version`
	pub fn cache_key(&self) -> String {
		format!("{}::{}::{}", self.config_name, self.schema_id, self.version)
	}
}

impl std::fmt::Display for ConfigKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{} ({})", self.config_name, self.version, self.schema_id)
	}
}

/// Target version of a reference edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefVersion {
	Pinned(u32),
	/// Follows whichever version currently has `is_latest` set
	Latest,
}

impl RefVersion {
	/// Column value for `config_refs.ref_version` (NULL means latest)
	pub fn as_column(&self) -> Option<i64> {
		match self {
			RefVersion::Pinned(v) => Some(i64::from(*v)),
			RefVersion::Latest => None,
		}
	}

	pub fn from_column(value: Option<i64>) -> Self {
		match value {
			Some(v) => RefVersion::Pinned(v as u32),
			None => RefVersion::Latest,
		}
	}
}

impl std::fmt::Display for RefVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RefVersion::Pinned(v) => write!(f, "{}", v),
			RefVersion::Latest => write!(f, "latest"),
		}
	}
}

impl Serialize for RefVersion {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			RefVersion::Pinned(v) => serializer.serialize_u32(*v),
			RefVersion::Latest => serializer.serialize_str("latest"),
		}
	}
}

/// A reference declared by a config to another config
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReference {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: RefVersion,
}

impl ConfigReference {
	pub fn new(config_name: impl Into<Box<str>>, schema_id: impl Into<Box<str>>, version: RefVersion) -> Self {
		Self { config_name: config_name.into(), schema_id: schema_id.into(), version }
	}

	/// Key used by per-run caches: `name::schema::version` (or `::latest`)
	pub fn cache_key(&self) -> String {
		format!("{}::{}::{}", self.config_name, self.schema_id, self.version)
	}

	/// Whether `key` is the config this reference currently points at, given
	/// the `is_latest` flag of `key`
	pub fn targets(&self, key: &ConfigKey, is_latest: bool) -> bool {
		self.config_name == key.config_name
			&& self.schema_id == key.schema_id
			&& match self.version {
				RefVersion::Pinned(v) => v == key.version,
				RefVersion::Latest => is_latest,
			}
	}
}

impl std::fmt::Display for ConfigReference {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{} ({})", self.config_name, self.version, self.schema_id)
	}
}

/// A stored config version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
	pub config: Value,
	pub created_at: Timestamp,
	pub created_by: Box<str>,
	pub is_latest: bool,
	pub config_schema_version: Box<str>,
	pub hash: Box<str>,
}

impl Config {
	pub fn key(&self) -> ConfigKey {
		ConfigKey::new(self.config_name.clone(), self.schema_id.clone(), self.version)
	}
}

/// A resolved reference target, as returned by batch resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRefResponse {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
	pub config: Value,
	pub hash: Box<str>,
	pub is_latest: bool,
}

impl ConfigRefResponse {
	pub fn key(&self) -> ConfigKey {
		ConfigKey::new(self.config_name.clone(), self.schema_id.clone(), self.version)
	}
}

impl From<Config> for ConfigRefResponse {
	fn from(config: Config) -> Self {
		Self {
			config_name: config.config_name,
			schema_id: config.schema_id,
			version: config.version,
			config: config.config,
			hash: config.hash,
			is_latest: config.is_latest,
		}
	}
}

/// A config that transitively references the traversal root
#[derive(Debug, Clone, PartialEq)]
pub struct AncestorConfig {
	pub config: ConfigRefResponse,
	/// References declared by this config
	pub refs: Vec<ConfigReference>,
	/// Shortest number of edges from this config down to the root
	pub depth: u32,
}

/// Data for a new config version
#[derive(Debug, Clone)]
pub struct CreateConfig {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
	pub config: Value,
	pub created_by: Box<str>,
	pub config_schema_version: Box<str>,
	pub hash: Box<str>,
}

/// A recomputed hash that differs from the stored one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashUpdate {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
	pub hash: Box<str>,
	pub old_hash: Box<str>,
}

#[async_trait]
pub trait ConfigAdapter: Debug + Send + Sync {
	/// Reads one config version, or the latest one if `version` is `None`
	async fn read_config(
		&self,
		config_name: &str,
		schema_id: &str,
		version: Option<u32>,
	) -> ClResult<Option<Config>>;

	/// Highest stored version of a lineage
	async fn read_max_version(&self, config_name: &str, schema_id: &str) -> ClResult<Option<u32>>;

	/// Stores a new config version with its reference edges.
	///
	/// In one transaction: clears `is_latest` on the lineage, checks that
	/// `config.version` is exactly the next version (`Error::VersionMismatch`
	/// otherwise), inserts the row flagged latest and inserts the edges.
	async fn create_config(&self, config: &CreateConfig, refs: &[ConfigReference]) -> ClResult<Config>;

	/// Overwrites the stored hash of one config version
	async fn update_hash(
		&self,
		config_name: &str,
		schema_id: &str,
		version: u32,
		hash: &str,
	) -> ClResult<()>;

	/// References declared by one config version
	async fn list_config_refs(&self, key: &ConfigKey) -> ClResult<Vec<ConfigReference>>;

	/// Resolves `refs` and everything they transitively reference.
	///
	/// Refs that do not resolve are absent from the result; callers decide
	/// whether that is fatal.
	async fn get_config_refs(&self, refs: &[ConfigReference]) -> ClResult<Vec<ConfigRefResponse>>;

	/// Every config that transitively references `key`, ordered by depth
	async fn list_ancestors(&self, key: &ConfigKey) -> ClResult<Vec<AncestorConfig>>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cache_keys() {
		let key = ConfigKey::new("db", "https://schemas/db/v1", 3);
		assert_eq!(key.cache_key(), "db::https://schemas/db/v1::3");

		let pinned = ConfigReference::new("db", "https://schemas/db/v1", RefVersion::Pinned(3));
		assert_eq!(pinned.cache_key(), key.cache_key());

		let latest = ConfigReference::new("db", "https://schemas/db/v1", RefVersion::Latest);
		assert_eq!(latest.cache_key(), "db::https://schemas/db/v1::latest");
	}

	#[test]
	fn test_reference_targets() {
		let key = ConfigKey::new("db", "s", 2);
		assert!(ConfigReference::new("db", "s", RefVersion::Pinned(2)).targets(&key, false));
		assert!(!ConfigReference::new("db", "s", RefVersion::Pinned(1)).targets(&key, true));
		assert!(ConfigReference::new("db", "s", RefVersion::Latest).targets(&key, true));
		assert!(!ConfigReference::new("db", "s", RefVersion::Latest).targets(&key, false));
		assert!(!ConfigReference::new("db", "other", RefVersion::Latest).targets(&key, true));
	}

	#[test]
	fn test_ref_version_column() {
		assert_eq!(RefVersion::Pinned(4).as_column(), Some(4));
		assert_eq!(RefVersion::Latest.as_column(), None);
		assert_eq!(RefVersion::from_column(None), RefVersion::Latest);
		assert_eq!(RefVersion::from_column(Some(7)), RefVersion::Pinned(7));
	}
}

// vim: ts=4
