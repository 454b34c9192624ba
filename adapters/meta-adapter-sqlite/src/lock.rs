//! Concurrency-limited leases
//!
//! Every acquisition runs in one transaction whose first statement deletes
//! the expired rows of the key. That write takes the SQLite database lock, so
//! the count-then-insert sequence below cannot interleave with another
//! acquisition, even from another process sharing the database file.

use sqlx::{Row, SqlitePool};

use crate::utils::*;
use confreg_types::lock_adapter::{LockAcquisition, LockRecord};
use confreg_types::prelude::*;

/// Acquire a new slot or renew the slot already held by `caller_id`
pub(crate) async fn acquire_or_renew(
	db: &SqlitePool,
	now: Timestamp,
	key: &str,
	caller_id: &str,
	ttl_secs: u32,
	limit: u32,
) -> ClResult<LockAcquisition> {
	let expires_at = now.add_secs(ttl_secs);
	let mut tx = db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	// Lazy cleanup, also takes the write lock
	let cleaned = sqlx::query("DELETE FROM locks WHERE key = ? AND expires_at < ?")
		.bind(key)
		.bind(now.0)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
	if cleaned.rows_affected() > 0 {
		debug!("lock {}: removed {} expired lease(s)", key, cleaned.rows_affected());
	}

	// Heartbeat
	let renewed = sqlx::query("UPDATE locks SET expires_at = ? WHERE key = ? AND caller_id = ?")
		.bind(expires_at.0)
		.bind(key)
		.bind(caller_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
	if renewed.rows_affected() > 0 {
		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
		debug!("lock {}: renewed by {} until {}", key, caller_id, expires_at);
		return Ok(LockAcquisition::Acquired);
	}

	let established = sqlx::query("SELECT \"limit\" FROM locks WHERE key = ? AND \"limit\" != ? LIMIT 1")
		.bind(key)
		.bind(i64::from(limit))
		.fetch_optional(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
	if let Some(row) = established {
		let established: i64 = row.try_get(0).inspect_err(inspect).map_err(|_| Error::DbError)?;
		tx.rollback().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
		return Err(Error::LimitMismatch {
			key: key.into(),
			established: established as u32,
			requested: limit,
		});
	}

	let row = sqlx::query("SELECT count(*), min(expires_at) FROM locks WHERE key = ? AND expires_at >= ?")
		.bind(key)
		.bind(now.0)
		.fetch_one(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
	let active_count: i64 = row.try_get(0).inspect_err(inspect).map_err(|_| Error::DbError)?;
	let earliest: Option<i64> = row.try_get(1).inspect_err(inspect).map_err(|_| Error::DbError)?;

	if active_count < i64::from(limit) {
		sqlx::query(
			"INSERT INTO locks (key, caller_id, created_at, expires_at, \"limit\") VALUES (?, ?, ?, ?, ?)",
		)
		.bind(key)
		.bind(caller_id)
		.bind(now.0)
		.bind(expires_at.0)
		.bind(i64::from(limit))
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
		debug!("lock {}: acquired by {} ({}/{})", key, caller_id, active_count + 1, limit);
		return Ok(LockAcquisition::Acquired);
	}

	// Nothing to keep but the cleanup
	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
	debug!("lock {}: denied to {} ({}/{})", key, caller_id, active_count, limit);

	Ok(LockAcquisition::Denied {
		active_count: active_count as u32,
		earliest_expires_at: earliest.map(Timestamp),
	})
}

/// Delete one lease, no-op if absent
pub(crate) async fn release(db: &SqlitePool, key: &str, caller_id: &str) -> ClResult<()> {
	let res = sqlx::query("DELETE FROM locks WHERE key = ? AND caller_id = ?")
		.bind(key)
		.bind(caller_id)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		debug!("lock {}: release by {} found no lease", key, caller_id);
	}

	Ok(())
}

/// List all stored leases of a key
pub(crate) async fn list(db: &SqlitePool, key: &str) -> ClResult<Vec<LockRecord>> {
	let rows = sqlx::query(
		"SELECT key, caller_id, created_at, expires_at, \"limit\" FROM locks
		WHERE key = ? ORDER BY created_at, caller_id",
	)
	.bind(key)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| {
		let limit: i64 = row.try_get("limit")?;
		Ok(LockRecord {
			key: row.try_get("key")?,
			caller_id: row.try_get("caller_id")?,
			created_at: Timestamp(row.try_get("created_at")?),
			expires_at: Timestamp(row.try_get("expires_at")?),
			limit: limit as u32,
		})
	}))
}

// vim: ts=4
