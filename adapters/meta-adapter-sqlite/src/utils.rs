//! Shared utilities for SQLite adapter
//!
//! This module contains helper functions and error mapping utilities
//! used across all domain modules.

use confreg_types::config_adapter::{ConfigReference, RefVersion};
use confreg_types::prelude::*;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Log database error for debugging
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Collect an iterator of query results, translating errors
pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>> + Unpin,
) -> ClResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Parse a JSON column
pub(crate) fn parse_json(row: &SqliteRow, column: &str) -> Result<serde_json::Value, sqlx::Error> {
	let text: &str = row.try_get(column)?;
	serde_json::from_str(text).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Append `VALUES (?, ?, ?), ...` rows for a list of references
pub(crate) fn push_ref_values<'a>(
	query: &mut sqlx::QueryBuilder<'a, sqlx::Sqlite>,
	refs: &'a [ConfigReference],
) {
	query.push("VALUES ");
	for (i, r) in refs.iter().enumerate() {
		if i > 0 {
			query.push(", ");
		}
		query.push("(");
		query.push_bind(r.config_name.as_ref());
		query.push(", ");
		query.push_bind(r.schema_id.as_ref());
		query.push(", ");
		query.push_bind(r.version.as_column());
		query.push(")");
	}
}

/// Read a reference from `ref_config_name`, `ref_schema_id`, `ref_version` columns
pub(crate) fn read_ref(row: &SqliteRow) -> Result<ConfigReference, sqlx::Error> {
	Ok(ConfigReference {
		config_name: row.try_get("ref_config_name")?,
		schema_id: row.try_get("ref_schema_id")?,
		version: RefVersion::from_column(row.try_get("ref_version")?),
	})
}

/// SQL condition matching configs `c` targeted by a reference row `r`
///
/// A reference with NULL version targets the row flagged latest.
pub(crate) fn ref_target_condition(c: &str, r: &str) -> String {
	format!(
		"{c}.config_name = {r}.ref_config_name AND {c}.schema_id = {r}.ref_schema_id \
		AND ({c}.version = {r}.ref_version OR ({r}.ref_version IS NULL AND {c}.is_latest))"
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ref_target_condition() {
		assert_eq!(
			ref_target_condition("t", "s"),
			"t.config_name = s.ref_config_name AND t.schema_id = s.ref_schema_id \
			AND (t.version = s.ref_version OR (s.ref_version IS NULL AND t.is_latest))"
		);
	}
}

// vim: ts=4
