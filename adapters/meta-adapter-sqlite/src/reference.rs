//! Reference graph traversal
//!
//! Both directions are single recursive CTEs. Edges with a NULL `ref_version`
//! follow the row currently flagged `is_latest`. Such edges can close cycles,
//! so every walk carries its depth and stops at `MAX_REF_DEPTH`.

use sqlx::{Row, SqlitePool};

use crate::utils::*;
use confreg_types::config_adapter::{
	AncestorConfig, ConfigKey, ConfigRefResponse, ConfigReference, MAX_REF_DEPTH,
};
use confreg_types::prelude::*;

/// References declared by one config version
pub(crate) async fn list(db: &SqlitePool, key: &ConfigKey) -> ClResult<Vec<ConfigReference>> {
	let rows = sqlx::query(
		"SELECT ref_config_name, ref_schema_id, ref_version FROM config_refs
		WHERE config_name = ? AND schema_id = ? AND version = ?
		ORDER BY ref_config_name, ref_schema_id, ref_version",
	)
	.bind(key.config_name.as_ref())
	.bind(key.schema_id.as_ref())
	.bind(i64::from(key.version))
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(read_ref))
}

/// Resolve refs together with their whole dependency closure
pub(crate) async fn list_descendants(
	db: &SqlitePool,
	refs: &[ConfigReference],
) -> ClResult<Vec<ConfigRefResponse>> {
	if refs.is_empty() {
		return Ok(Vec::new());
	}

	let mut query =
		sqlx::QueryBuilder::new("WITH RECURSIVE seed(ref_config_name, ref_schema_id, ref_version) AS (");
	push_ref_values(&mut query, refs);
	query.push(format!(
		"), down(config_name, schema_id, version, depth) AS (
			SELECT c.config_name, c.schema_id, c.version, 0
			FROM seed s JOIN configs c ON {}
			UNION
			SELECT c.config_name, c.schema_id, c.version, d.depth + 1
			FROM down d
			JOIN config_refs r ON r.config_name = d.config_name AND r.schema_id = d.schema_id AND r.version = d.version
			JOIN configs c ON {}
			WHERE d.depth < ",
		ref_target_condition("c", "s"),
		ref_target_condition("c", "r"),
	));
	query.push_bind(i64::from(MAX_REF_DEPTH));
	query.push(
		")
		SELECT c.config_name, c.schema_id, c.version, c.config, c.hash, c.is_latest
		FROM configs c
		WHERE (c.config_name, c.schema_id, c.version) IN (SELECT config_name, schema_id, version FROM down)
		ORDER BY c.config_name, c.schema_id, c.version",
	);

	let rows = query
		.build()
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| {
		let version: i64 = row.try_get("version")?;
		Ok(ConfigRefResponse {
			config_name: row.try_get("config_name")?,
			schema_id: row.try_get("schema_id")?,
			version: version as u32,
			config: parse_json(row, "config")?,
			hash: row.try_get("hash")?,
			is_latest: row.try_get("is_latest")?,
		})
	}))
}

/// Every config that transitively references `key`, shallowest first
pub(crate) async fn list_ancestors(db: &SqlitePool, key: &ConfigKey) -> ClResult<Vec<AncestorConfig>> {
	let sql = format!(
		"WITH RECURSIVE up(config_name, schema_id, version, depth) AS (
			SELECT r.config_name, r.schema_id, r.version, 1
			FROM configs t JOIN config_refs r ON {target}
			WHERE t.config_name = ? AND t.schema_id = ? AND t.version = ?
			UNION
			SELECT r.config_name, r.schema_id, r.version, u.depth + 1
			FROM up u
			JOIN configs t ON t.config_name = u.config_name AND t.schema_id = u.schema_id AND t.version = u.version
			JOIN config_refs r ON {target}
			WHERE u.depth < ?
		), anc AS (
			SELECT config_name, schema_id, version, min(depth) AS depth
			FROM up GROUP BY config_name, schema_id, version
		)
		SELECT c.config_name, c.schema_id, c.version, c.config, c.hash, c.is_latest, anc.depth,
			r.ref_config_name, r.ref_schema_id, r.ref_version
		FROM anc
		JOIN configs c ON c.config_name = anc.config_name AND c.schema_id = anc.schema_id AND c.version = anc.version
		LEFT JOIN config_refs r ON r.config_name = c.config_name AND r.schema_id = c.schema_id AND r.version = c.version
		ORDER BY anc.depth, c.config_name, c.schema_id, c.version",
		target = ref_target_condition("t", "r"),
	);

	let rows = sqlx::query(&sql)
		.bind(key.config_name.as_ref())
		.bind(key.schema_id.as_ref())
		.bind(i64::from(key.version))
		.bind(i64::from(MAX_REF_DEPTH))
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	// One row per (ancestor, declared ref), grouped by the ORDER BY above
	let mut ancestors: Vec<AncestorConfig> = Vec::new();
	for row in &rows {
		let version: i64 = row.try_get("version").inspect_err(inspect).map_err(|_| Error::DbError)?;
		let config_name: Box<str> =
			row.try_get("config_name").inspect_err(inspect).map_err(|_| Error::DbError)?;
		let schema_id: Box<str> = row.try_get("schema_id").inspect_err(inspect).map_err(|_| Error::DbError)?;

		let same = ancestors.last().is_some_and(|a| {
			a.config.version == version as u32
				&& a.config.config_name == config_name
				&& a.config.schema_id == schema_id
		});
		if !same {
			let depth: i64 = row.try_get("depth").inspect_err(inspect).map_err(|_| Error::DbError)?;
			let config = ConfigRefResponse {
				config_name,
				schema_id,
				version: version as u32,
				config: parse_json(row, "config").inspect_err(inspect).map_err(|_| Error::DbError)?,
				hash: row.try_get("hash").inspect_err(inspect).map_err(|_| Error::DbError)?,
				is_latest: row.try_get("is_latest").inspect_err(inspect).map_err(|_| Error::DbError)?,
			};
			ancestors.push(AncestorConfig { config, refs: Vec::new(), depth: depth as u32 });
		}

		let ref_name: Option<Box<str>> =
			row.try_get("ref_config_name").inspect_err(inspect).map_err(|_| Error::DbError)?;
		if ref_name.is_some() {
			let r = read_ref(row).inspect_err(inspect).map_err(|_| Error::DbError)?;
			if let Some(ancestor) = ancestors.last_mut() {
				ancestor.refs.push(r);
			}
		}
	}

	debug!("{}: {} ancestor(s)", key, ancestors.len());
	Ok(ancestors)
}

// vim: ts=4
