//! Common types used throughout confreg.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

// Timestamp //
//***********//
/// Unix epoch timestamp in milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(res.as_millis() as i64)
	}

	pub fn from_secs(secs: i64) -> Timestamp {
		Timestamp(secs.saturating_mul(1000))
	}

	pub fn add(self, duration: Duration) -> Timestamp {
		Timestamp(self.0.saturating_add(duration.as_millis() as i64))
	}

	pub fn add_secs(self, secs: u32) -> Timestamp {
		Timestamp(self.0.saturating_add(i64::from(secs) * 1000))
	}

	/// Milliseconds from `self` until `later` (negative if `later` is in the past)
	pub fn millis_until(self, later: Timestamp) -> i64 {
		later.0.saturating_sub(self.0)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

// Clock //
//*******//
/// Time source for everything that compares against "now" (lock expiry, retry hints)
pub trait Clock: std::fmt::Debug + Send + Sync {
	fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::now()
	}
}

/// Manually driven clock, only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicI64,
}

impl ManualClock {
	pub fn new(start: Timestamp) -> Self {
		Self { now: AtomicI64::new(start.0) }
	}

	pub fn advance(&self, duration: Duration) {
		self.now.fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
	}

	pub fn set(&self, now: Timestamp) {
		self.now.store(now.0, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		Timestamp(self.now.load(Ordering::SeqCst))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timestamp_arithmetic() {
		let ts = Timestamp::from_secs(100);
		assert_eq!(ts.0, 100_000);
		assert_eq!(ts.add_secs(10), Timestamp(110_000));
		assert_eq!(ts.add(Duration::from_millis(250)), Timestamp(100_250));
		assert_eq!(ts.millis_until(Timestamp(99_000)), -1_000);
	}

	#[test]
	fn test_manual_clock() {
		let clock = ManualClock::new(Timestamp::from_secs(1_000));
		assert_eq!(clock.now(), Timestamp(1_000_000));
		clock.advance(Duration::from_secs(11));
		assert_eq!(clock.now(), Timestamp(1_011_000));
		clock.set(Timestamp(5));
		assert_eq!(clock.now(), Timestamp(5));
	}

	#[test]
	fn test_timestamp_serializes_as_number() {
		let json = serde_json::to_string(&Timestamp(42)).unwrap_or_default();
		assert_eq!(json, "42");
	}
}

// vim: ts=4
