//! Lock Manager
//!
//! Thin service over a [`LockAdapter`]. It validates requests and, when all
//! slots of a key are taken, turns the earliest lease deadline into a
//! `Retry-After` hint for the caller.

use rand::RngExt;
use std::sync::Arc;

use confreg_types::lock_adapter::{LockAcquisition, LockAdapter};

use crate::prelude::*;

/// Default upper bound of the random seconds added to retry hints
pub const DEFAULT_MAX_JITTER_SECS: u32 = 2;

/// Result of a lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
	Acquired,
	Denied {
		/// Seconds the caller should wait before trying again, always at least 1
		retry_after_secs: u32,
		active_count: u32,
	},
}

#[derive(Debug)]
pub struct LockManager {
	adapter: Arc<dyn LockAdapter>,
	clock: Arc<dyn Clock>,
	max_jitter_secs: u32,
}

impl LockManager {
	pub fn new(adapter: Arc<dyn LockAdapter>, clock: Arc<dyn Clock>) -> Self {
		Self { adapter, clock, max_jitter_secs: DEFAULT_MAX_JITTER_SECS }
	}

	pub fn with_max_jitter(mut self, max_jitter_secs: u32) -> Self {
		self.max_jitter_secs = max_jitter_secs;
		self
	}

	/// Acquires a slot under `key`, or extends the one `caller_id` already holds
	pub async fn acquire_lock(
		&self,
		key: &str,
		caller_id: &str,
		ttl_secs: u32,
		limit: u32,
	) -> ClResult<LockOutcome> {
		validate_ids(key, caller_id)?;
		if ttl_secs == 0 {
			return Err(Error::ValidationError("ttl must be positive".into()));
		}
		if limit == 0 {
			return Err(Error::ValidationError("limit must be positive".into()));
		}

		let res = self.adapter.acquire_or_renew_lock(key, caller_id, ttl_secs, limit).await?;
		match res {
			LockAcquisition::Acquired => Ok(LockOutcome::Acquired),
			LockAcquisition::Denied { active_count, earliest_expires_at } => {
				let jitter = if self.max_jitter_secs > 0 {
					rand::rng().random_range(0..=self.max_jitter_secs)
				} else {
					0
				};
				let retry_after_secs =
					compute_retry_after(self.clock.now(), earliest_expires_at, jitter);
				info!(
					key = %key,
					caller_id = %caller_id,
					active_count,
					limit,
					retry_after_secs,
					"lock denied"
				);
				Ok(LockOutcome::Denied { retry_after_secs, active_count })
			}
		}
	}

	/// Releases the slot of `caller_id`; releasing twice is fine
	pub async fn release_lock(&self, key: &str, caller_id: &str) -> ClResult<()> {
		validate_ids(key, caller_id)?;
		self.adapter.release_lock(key, caller_id).await
	}
}

fn validate_ids(key: &str, caller_id: &str) -> ClResult<()> {
	if key.is_empty() {
		return Err(Error::ValidationError("key must not be empty".into()));
	}
	if caller_id.is_empty() {
		return Err(Error::ValidationError("callerId must not be empty".into()));
	}
	Ok(())
}

/// Seconds a denied caller should wait.
///
/// Aims at half of the time left on the earliest lease plus `jitter`, never
/// below one second and never beyond the time that lease has left.
pub fn compute_retry_after(now: Timestamp, earliest_expires_at: Option<Timestamp>, jitter: u32) -> u32 {
	let Some(earliest) = earliest_expires_at else {
		return 1 + jitter;
	};

	let millis = now.millis_until(earliest).max(0) as u64;
	let until_expiry = millis.div_ceil(1000);
	let optimistic = until_expiry.div_ceil(2);
	let retry = optimistic.max(1) + u64::from(jitter);

	u32::try_from(retry.min(until_expiry.max(1))).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	const NOW: Timestamp = Timestamp(1_000_000);

	#[test]
	fn test_retry_after_half_of_remaining() {
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 10_000)), 0), 5);
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 9_001)), 0), 5);
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 30_000)), 2), 17);
	}

	#[test]
	fn test_retry_after_never_exceeds_remaining() {
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 2_000)), 2), 2);
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 1_500)), 1), 2);
	}

	#[test]
	fn test_retry_after_at_least_one() {
		assert_eq!(compute_retry_after(NOW, Some(NOW), 0), 1);
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 - 5_000)), 2), 1);
		assert_eq!(compute_retry_after(NOW, Some(Timestamp(NOW.0 + 1)), 0), 1);
	}

	#[test]
	fn test_retry_after_unknown_expiry() {
		assert_eq!(compute_retry_after(NOW, None, 0), 1);
		assert_eq!(compute_retry_after(NOW, None, 2), 3);
	}
}

// vim: ts=4
