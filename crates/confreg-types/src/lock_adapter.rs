//! Adapter that persists concurrency-limited leases.
//!
//! A lease ("lock") is one held slot under a key. At most `limit` unexpired
//! leases may exist for a key at a time, and all of them carry the same limit.
//! Leases expire passively: expired rows are ignored by counts and deleted by
//! the next acquisition attempt against the same key.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

use crate::prelude::*;

/// One persisted lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
	pub key: Box<str>,
	pub caller_id: Box<str>,
	pub created_at: Timestamp,
	pub expires_at: Timestamp,
	pub limit: u32,
}

/// Result of an acquire-or-renew attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
	/// The caller holds a slot (newly inserted or renewed)
	Acquired,
	/// All slots are taken by other callers
	Denied {
		/// Live holders at the time of the attempt
		active_count: u32,
		/// Earliest lease deadline among the live holders
		earliest_expires_at: Option<Timestamp>,
	},
}

impl LockAcquisition {
	pub fn is_acquired(&self) -> bool {
		matches!(self, LockAcquisition::Acquired)
	}
}

#[async_trait]
pub trait LockAdapter: Debug + Send + Sync {
	/// Acquires a slot under `key` for `caller_id`, or renews it if the caller
	/// already holds one. `ttl_secs` is the lease length from now.
	///
	/// Fails with `Error::LimitMismatch` if live leases for `key` were taken
	/// with a different `limit`.
	async fn acquire_or_renew_lock(
		&self,
		key: &str,
		caller_id: &str,
		ttl_secs: u32,
		limit: u32,
	) -> ClResult<LockAcquisition>;

	/// Deletes the lease of `caller_id` under `key`. Releasing a lease that does
	/// not exist is not an error.
	async fn release_lock(&self, key: &str, caller_id: &str) -> ClResult<()>;

	/// Lists every stored lease for `key`, including expired rows that have not
	/// been cleaned up yet
	async fn list_locks(&self, key: &str) -> ClResult<Vec<LockRecord>>;
}

// vim: ts=4
