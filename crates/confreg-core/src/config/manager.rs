//! Config Manager
//!
//! Entry point for storing and reading config documents. A new version is
//! checked against its schema with all references inlined, stored together
//! with its reference edges, and then its ancestors get their hashes
//! recomputed.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use confreg_types::config_adapter::{
	CONFIG_SCHEMA_VERSION, Config, ConfigAdapter, ConfigReference, CreateConfig,
};
use confreg_types::schema_manager::SchemaManager;

use super::hash::compute_hash;
use super::propagation::{self, PropagationReport};
use super::refs::{self, RefCache};
use crate::prelude::*;
use crate::schema::validator::SchemaValidator;

const DEFAULT_CREATED_BY: &str = "anonymous";

/// A new config version as submitted by a client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigRequest {
	pub config_name: Box<str>,
	pub schema_id: Box<str>,
	pub version: u32,
	pub config: Value,
	pub created_by: Option<Box<str>>,
}

#[derive(Debug)]
pub struct ConfigManager {
	adapter: Arc<dyn ConfigAdapter>,
	schemas: Arc<dyn SchemaManager>,
	validator: SchemaValidator,
}

impl ConfigManager {
	pub fn new(adapter: Arc<dyn ConfigAdapter>, schemas: Arc<dyn SchemaManager>) -> Self {
		Self { adapter, schemas, validator: SchemaValidator::new() }
	}

	/// Resolves `refs` with their dependency closure; every one of them must exist
	async fn resolve_refs(&self, refs: &[ConfigReference]) -> ClResult<RefCache> {
		let mut cache = RefCache::new();
		cache.extend(self.adapter.get_config_refs(refs).await?);

		let missing: Vec<String> =
			refs.iter().filter(|r| cache.resolve(r).is_none()).map(ToString::to_string).collect();
		if !missing.is_empty() {
			return Err(Error::ConfigNotFound(missing.join(", ")));
		}
		Ok(cache)
	}

	/// Validates, stores and propagates a new config version
	pub async fn create_config(&self, req: CreateConfigRequest) -> ClResult<Config> {
		if req.config_name.is_empty() {
			return Err(Error::ValidationError("configName must not be empty".into()));
		}
		if req.schema_id.is_empty() {
			return Err(Error::ValidationError("schemaId must not be empty".into()));
		}
		if req.version == 0 {
			return Err(Error::ValidationError("version must be positive".into()));
		}
		info!("creating config {}@{} ({})", req.config_name, req.version, req.schema_id);

		let schema = self.schemas.get_schema(&req.schema_id, true).await?;

		let refs = refs::extract_refs(&req.config)?;
		let cache = self.resolve_refs(&refs).await?;
		let dereferenced = refs::dereference(&req.config, &cache)?;
		let documents = self.schemas.get_schema_closure(&req.schema_id).await?;
		self.validator.validate(&req.schema_id, &schema, &documents, &dereferenced)?;

		let expected = self
			.adapter
			.read_max_version(&req.config_name, &req.schema_id)
			.await?
			.map_or(1, |v| v + 1);
		if req.version != expected {
			return Err(Error::VersionMismatch { expected, got: req.version });
		}

		let hash = compute_hash(&req.config, &refs, &cache)?.hash;
		let new_config = CreateConfig {
			config_name: req.config_name,
			schema_id: req.schema_id,
			version: req.version,
			config: req.config,
			created_by: req.created_by.unwrap_or_else(|| DEFAULT_CREATED_BY.into()),
			config_schema_version: CONFIG_SCHEMA_VERSION.into(),
			hash,
		};
		let stored = self.adapter.create_config(&new_config, &refs).await?;

		// Committed at this point, propagation errors are only logged
		if let Err(err) = propagation::propagate(self.adapter.as_ref(), &stored.clone().into()).await {
			error!("hash propagation after {} failed: {}", stored.key(), err);
		}

		Ok(stored)
	}

	/// Reads a config version (latest if `version` is `None`), optionally
	/// with every reference replaced by the referenced body
	pub async fn get_config(
		&self,
		config_name: &str,
		schema_id: &str,
		version: Option<u32>,
		dereference: bool,
	) -> ClResult<Config> {
		let mut config = self
			.adapter
			.read_config(config_name, schema_id, version)
			.await?
			.ok_or_else(|| {
				Error::ConfigNotFound(format!(
					"{}@{} ({})",
					config_name,
					version.map_or_else(|| "latest".to_string(), |v| v.to_string()),
					schema_id
				))
			})?;

		if dereference {
			let refs = refs::extract_refs(&config.config)?;
			let cache = self.resolve_refs(&refs).await?;
			config.config = refs::dereference(&config.config, &cache)?;
		}

		Ok(config)
	}

	/// Recomputes the hashes of every config above an existing one
	pub async fn propagate_hashes(
		&self,
		config_name: &str,
		schema_id: &str,
		version: u32,
	) -> ClResult<PropagationReport> {
		let config = self.get_config(config_name, schema_id, Some(version), false).await?;
		propagation::propagate(self.adapter.as_ref(), &config.into()).await
	}
}

// vim: ts=4
