//! Database schema initialization
//!
//! This module creates the tables and indexes used by the adapter. Every
//! statement is idempotent, so it runs on each start-up.

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Locks
	//*******
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS locks (
		key text NOT NULL,
		caller_id text NOT NULL,
		created_at integer NOT NULL,	-- epoch millis
		expires_at integer NOT NULL,	-- epoch millis, lease deadline
		\"limit\" integer NOT NULL,		-- concurrency bound agreed for the key
		PRIMARY KEY(key, caller_id)
	) WITHOUT ROWID",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_locks_key_expires ON locks(key, expires_at)")
		.execute(&mut *tx)
		.await?;

	// Configs
	//*********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS configs (
		config_name text NOT NULL,
		schema_id text NOT NULL,
		version integer NOT NULL,
		config text NOT NULL,			-- JSON document
		created_at integer NOT NULL,
		created_by text NOT NULL,
		is_latest boolean NOT NULL DEFAULT 0,
		config_schema_version text NOT NULL,
		hash text NOT NULL,
		PRIMARY KEY(config_name, schema_id, version)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_configs_latest ON configs(config_name, schema_id) WHERE is_latest",
	)
	.execute(&mut *tx)
	.await?;

	// Config references
	//*******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS config_refs (
		config_name text NOT NULL,
		schema_id text NOT NULL,
		version integer NOT NULL,
		ref_config_name text NOT NULL,
		ref_schema_id text NOT NULL,
		ref_version integer,			-- NULL: follows the latest version
		FOREIGN KEY(config_name, schema_id, version) REFERENCES configs(config_name, schema_id, version)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_config_refs_config ON config_refs(config_name, schema_id, version)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_config_refs_target ON config_refs(ref_config_name, ref_schema_id, ref_version)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
