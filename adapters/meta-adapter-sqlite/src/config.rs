//! Versioned config storage
//!
//! Versions are contiguous per `(config_name, schema_id)` lineage and exactly
//! one row of a lineage carries `is_latest`.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::utils::*;
use confreg_types::config_adapter::{Config, ConfigReference, CreateConfig};
use confreg_types::prelude::*;

const CONFIG_COLUMNS: &str = "config_name, schema_id, version, config, created_at, created_by, \
	is_latest, config_schema_version, hash";

fn read_row(row: &SqliteRow) -> Result<Config, sqlx::Error> {
	let version: i64 = row.try_get("version")?;
	Ok(Config {
		config_name: row.try_get("config_name")?,
		schema_id: row.try_get("schema_id")?,
		version: version as u32,
		config: parse_json(row, "config")?,
		created_at: Timestamp(row.try_get("created_at")?),
		created_by: row.try_get("created_by")?,
		is_latest: row.try_get("is_latest")?,
		config_schema_version: row.try_get("config_schema_version")?,
		hash: row.try_get("hash")?,
	})
}

/// Read a config version, or the latest version if `version` is not given
pub(crate) async fn read(
	db: &SqlitePool,
	config_name: &str,
	schema_id: &str,
	version: Option<u32>,
) -> ClResult<Option<Config>> {
	let mut query = sqlx::QueryBuilder::new(format!(
		"SELECT {} FROM configs WHERE config_name = ",
		CONFIG_COLUMNS
	));
	query.push_bind(config_name).push(" AND schema_id = ").push_bind(schema_id);
	match version {
		Some(version) => query.push(" AND version = ").push_bind(i64::from(version)),
		None => query.push(" AND is_latest"),
	};

	let row = query
		.build()
		.fetch_optional(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	row.map(|row| read_row(&row).inspect_err(inspect).map_err(|_| Error::DbError))
		.transpose()
}

/// Highest stored version of a lineage
pub(crate) async fn read_max_version(
	db: &SqlitePool,
	config_name: &str,
	schema_id: &str,
) -> ClResult<Option<u32>> {
	let max: Option<i64> =
		sqlx::query_scalar("SELECT max(version) FROM configs WHERE config_name = ? AND schema_id = ?")
			.bind(config_name)
			.bind(schema_id)
			.fetch_one(db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

	Ok(max.map(|v| v as u32))
}

/// Insert a new config version together with its reference edges
pub(crate) async fn create(
	db: &SqlitePool,
	now: Timestamp,
	config: &CreateConfig,
	refs: &[ConfigReference],
) -> ClResult<Config> {
	let body = serde_json::to_string(&config.config)?;
	let mut tx = db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	// Taking the write lock first keeps the version check below authoritative
	sqlx::query("UPDATE configs SET is_latest = 0 WHERE config_name = ? AND schema_id = ? AND is_latest")
		.bind(config.config_name.as_ref())
		.bind(config.schema_id.as_ref())
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	let max: Option<i64> =
		sqlx::query_scalar("SELECT max(version) FROM configs WHERE config_name = ? AND schema_id = ?")
			.bind(config.config_name.as_ref())
			.bind(config.schema_id.as_ref())
			.fetch_one(&mut *tx)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;
	let expected = max.map_or(1, |v| v as u32 + 1);
	if config.version != expected {
		tx.rollback().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
		return Err(Error::VersionMismatch { expected, got: config.version });
	}

	sqlx::query(
		"INSERT INTO configs (config_name, schema_id, version, config, created_at, created_by,
			is_latest, config_schema_version, hash)
		VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
	)
	.bind(config.config_name.as_ref())
	.bind(config.schema_id.as_ref())
	.bind(i64::from(config.version))
	.bind(&body)
	.bind(now.0)
	.bind(config.created_by.as_ref())
	.bind(config.config_schema_version.as_ref())
	.bind(config.hash.as_ref())
	.execute(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	if !refs.is_empty() {
		let mut query = sqlx::QueryBuilder::new(
			"INSERT INTO config_refs (config_name, schema_id, version, ref_config_name, ref_schema_id, ref_version) ",
		);
		query.push_values(refs, |mut b, r| {
			b.push_bind(config.config_name.as_ref())
				.push_bind(config.schema_id.as_ref())
				.push_bind(i64::from(config.version))
				.push_bind(r.config_name.as_ref())
				.push_bind(r.schema_id.as_ref())
				.push_bind(r.version.as_column());
		});
		query
			.build()
			.execute(&mut *tx)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;
	}

	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
	info!(
		"config {}@{} ({}) stored with {} reference(s)",
		config.config_name,
		config.version,
		config.schema_id,
		refs.len()
	);

	Ok(Config {
		config_name: config.config_name.clone(),
		schema_id: config.schema_id.clone(),
		version: config.version,
		config: config.config.clone(),
		created_at: now,
		created_by: config.created_by.clone(),
		is_latest: true,
		config_schema_version: config.config_schema_version.clone(),
		hash: config.hash.clone(),
	})
}

/// Overwrite the stored hash of one version
pub(crate) async fn update_hash(
	db: &SqlitePool,
	config_name: &str,
	schema_id: &str,
	version: u32,
	hash: &str,
) -> ClResult<()> {
	let res = sqlx::query("UPDATE configs SET hash = ? WHERE config_name = ? AND schema_id = ? AND version = ?")
		.bind(hash)
		.bind(config_name)
		.bind(schema_id)
		.bind(i64::from(version))
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		return Err(Error::ConfigNotFound(format!("{}@{} ({})", config_name, version, schema_id)));
	}

	Ok(())
}

// vim: ts=4
