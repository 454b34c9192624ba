//! Lock Manager tests against the SQLite adapter

use confreg_core::lock::manager::{LockManager, LockOutcome};
use confreg_meta_adapter_sqlite::MetaAdapterSqlite;
use confreg_types::error::Error;
use confreg_types::lock_adapter::LockAdapter;
use confreg_types::types::{ManualClock, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn setup(max_jitter: u32) -> (LockManager, Arc<MetaAdapterSqlite>, Arc<ManualClock>, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let clock = Arc::new(ManualClock::new(Timestamp(1_700_000_000_000)));
	let adapter = Arc::new(
		MetaAdapterSqlite::with_clock(temp_dir.path(), clock.clone())
			.await
			.expect("Failed to create adapter"),
	);
	let manager = LockManager::new(adapter.clone(), clock.clone()).with_max_jitter(max_jitter);
	(manager, adapter, clock, temp_dir)
}

#[tokio::test]
async fn test_denied_caller_gets_retry_hint() {
	let (manager, _adapter, clock, _temp) = setup(2).await;

	assert_eq!(manager.acquire_lock("job", "c1", 60, 2).await.expect("c1"), LockOutcome::Acquired);
	assert_eq!(manager.acquire_lock("job", "c2", 60, 2).await.expect("c2"), LockOutcome::Acquired);

	match manager.acquire_lock("job", "c3", 60, 2).await.expect("c3") {
		LockOutcome::Denied { retry_after_secs, active_count } => {
			assert_eq!(active_count, 2);
			assert!((30..=32).contains(&retry_after_secs), "got {}", retry_after_secs);
		}
		LockOutcome::Acquired => panic!("third caller must be denied"),
	}

	// Near the deadline the hint shrinks to what is left
	clock.advance(Duration::from_secs(59));
	match manager.acquire_lock("job", "c3", 60, 2).await.expect("c3") {
		LockOutcome::Denied { retry_after_secs, .. } => assert_eq!(retry_after_secs, 1),
		LockOutcome::Acquired => panic!("third caller must be denied"),
	}

	manager.release_lock("job", "c1").await.expect("release");
	assert_eq!(manager.acquire_lock("job", "c3", 60, 2).await.expect("c3"), LockOutcome::Acquired);
}

#[tokio::test]
async fn test_ttl_scenario() {
	let (manager, adapter, clock, _temp) = setup(0).await;

	assert_eq!(manager.acquire_lock("job", "c1", 10, 1).await.expect("c1"), LockOutcome::Acquired);
	clock.advance(Duration::from_secs(11));
	assert_eq!(manager.acquire_lock("job", "c2", 10, 1).await.expect("c2"), LockOutcome::Acquired);

	let locks = adapter.list_locks("job").await.expect("list");
	assert_eq!(locks.len(), 1);
	assert_eq!(locks[0].caller_id.as_ref(), "c2");
}

#[tokio::test]
async fn test_rejects_invalid_requests() {
	let (manager, adapter, _clock, _temp) = setup(0).await;

	for (key, caller, ttl, limit) in [("", "c", 10, 1), ("k", "", 10, 1), ("k", "c", 0, 1), ("k", "c", 10, 0)] {
		let res = manager.acquire_lock(key, caller, ttl, limit).await;
		assert!(matches!(res, Err(Error::ValidationError(_))), "{:?}", (key, caller, ttl, limit));
	}
	assert!(adapter.list_locks("k").await.expect("list").is_empty());

	assert!(matches!(manager.release_lock("", "c").await, Err(Error::ValidationError(_))));
	manager.release_lock("k", "never-held").await.expect("release is idempotent");
}

#[tokio::test]
async fn test_limit_mismatch_is_reported() {
	let (manager, _adapter, _clock, _temp) = setup(0).await;

	manager.acquire_lock("job", "c1", 10, 2).await.expect("c1");
	let res = manager.acquire_lock("job", "c2", 10, 4).await;
	assert!(matches!(res, Err(Error::LimitMismatch { established: 2, requested: 4, .. })));
}

// vim: ts=4
