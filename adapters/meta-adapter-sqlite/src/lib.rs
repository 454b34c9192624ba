//! SQLite implementation of the lock and config adapters
//!
//! The database file lives in a directory given at construction time. Several
//! processes may open the same file; all coordination happens through SQLite
//! transactions.

mod config;
mod lock;
mod reference;
mod schema;
mod utils;

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::path::Path;
use std::sync::Arc;

use confreg_types::config_adapter::{
	AncestorConfig, Config, ConfigAdapter, ConfigKey, ConfigRefResponse, ConfigReference,
	CreateConfig,
};
use confreg_types::lock_adapter::{LockAcquisition, LockAdapter, LockRecord};
use confreg_types::prelude::*;
use confreg_types::types::SystemClock;

use crate::schema::init_db;

const DB_FILE: &str = "confreg.db";

#[derive(Debug)]
pub struct MetaAdapterSqlite {
	db: SqlitePool,
	clock: Arc<dyn Clock>,
}

impl MetaAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> ClResult<Self> {
		Self::with_clock(path, Arc::new(SystemClock)).await
	}

	/// Opens the database with an explicit time source for lock expiry
	pub async fn with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> ClResult<Self> {
		tokio::fs::create_dir_all(path.as_ref()).await?;

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref().join(DB_FILE))
			.create_if_missing(true)
			.foreign_keys(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.map_err(|_| Error::DbError)?;

		init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.map_err(|_| Error::DbError)?;

		info!("SQLite database opened at {}", path.as_ref().join(DB_FILE).display());
		Ok(Self { db, clock })
	}
}

#[async_trait]
impl LockAdapter for MetaAdapterSqlite {
	async fn acquire_or_renew_lock(
		&self,
		key: &str,
		caller_id: &str,
		ttl_secs: u32,
		limit: u32,
	) -> ClResult<LockAcquisition> {
		lock::acquire_or_renew(&self.db, self.clock.now(), key, caller_id, ttl_secs, limit).await
	}

	async fn release_lock(&self, key: &str, caller_id: &str) -> ClResult<()> {
		lock::release(&self.db, key, caller_id).await
	}

	async fn list_locks(&self, key: &str) -> ClResult<Vec<LockRecord>> {
		lock::list(&self.db, key).await
	}
}

#[async_trait]
impl ConfigAdapter for MetaAdapterSqlite {
	// Config management
	//*******************
	async fn read_config(
		&self,
		config_name: &str,
		schema_id: &str,
		version: Option<u32>,
	) -> ClResult<Option<Config>> {
		config::read(&self.db, config_name, schema_id, version).await
	}

	async fn read_max_version(&self, config_name: &str, schema_id: &str) -> ClResult<Option<u32>> {
		config::read_max_version(&self.db, config_name, schema_id).await
	}

	async fn create_config(&self, new_config: &CreateConfig, refs: &[ConfigReference]) -> ClResult<Config> {
		config::create(&self.db, self.clock.now(), new_config, refs).await
	}

	async fn update_hash(
		&self,
		config_name: &str,
		schema_id: &str,
		version: u32,
		hash: &str,
	) -> ClResult<()> {
		config::update_hash(&self.db, config_name, schema_id, version, hash).await
	}

	// Reference graph
	//*****************
	async fn list_config_refs(&self, key: &ConfigKey) -> ClResult<Vec<ConfigReference>> {
		reference::list(&self.db, key).await
	}

	async fn get_config_refs(&self, refs: &[ConfigReference]) -> ClResult<Vec<ConfigRefResponse>> {
		reference::list_descendants(&self.db, refs).await
	}

	async fn list_ancestors(&self, key: &ConfigKey) -> ClResult<Vec<AncestorConfig>> {
		reference::list_ancestors(&self.db, key).await
	}
}

// vim: ts=4
