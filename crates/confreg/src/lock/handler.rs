//! Lease REST endpoints

use axum::{
	Json,
	extract::{Path, State},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::extract::ValidJson;
use crate::prelude::*;
use confreg_core::lock::manager::LockOutcome;

/// Request structure for acquiring or renewing a lease
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
	pub key: String,
	pub caller_id: String,
	/// Lease length in seconds
	pub ttl: i64,
	/// Maximum number of concurrent holders of `key`
	pub limit: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResponse {
	pub acquired: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub active_count: Option<u32>,
}

fn positive(name: &str, value: i64) -> ClResult<u32> {
	u32::try_from(value)
		.ok()
		.filter(|v| *v > 0)
		.ok_or_else(|| Error::ValidationError(format!("{} must be a positive integer", name)))
}

/// POST /locks - Acquire or renew a lease
pub async fn post_lock(
	State(app): State<App>,
	ValidJson(req): ValidJson<LockRequest>,
) -> ClResult<Response> {
	let ttl = positive("ttl", req.ttl)?;
	let limit = positive("limit", req.limit)?;
	debug!(key = %req.key, caller_id = %req.caller_id, ttl, limit, "POST /locks");

	let outcome = app.lock_manager.acquire_lock(&req.key, &req.caller_id, ttl, limit).await?;
	let response = match outcome {
		LockOutcome::Acquired => (
			StatusCode::OK,
			Json(LockResponse { acquired: true, retry_after: None, active_count: None }),
		)
			.into_response(),
		LockOutcome::Denied { retry_after_secs, active_count } => (
			StatusCode::LOCKED,
			[(header::RETRY_AFTER, retry_after_secs.to_string())],
			Json(LockResponse {
				acquired: false,
				retry_after: Some(retry_after_secs),
				active_count: Some(active_count),
			}),
		)
			.into_response(),
	};

	Ok(response)
}

/// DELETE /locks/{key}/{callerId} - Release a lease
pub async fn delete_lock(
	State(app): State<App>,
	Path((key, caller_id)): Path<(String, String)>,
) -> ClResult<StatusCode> {
	debug!(key = %key, caller_id = %caller_id, "DELETE /locks");
	app.lock_manager.release_lock(&key, &caller_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_positive() {
		assert_eq!(positive("ttl", 10).ok(), Some(10));
		assert!(positive("ttl", 0).is_err());
		assert!(positive("ttl", -5).is_err());
		assert!(positive("ttl", i64::from(u32::MAX) + 1).is_err());
	}
}

// vim: ts=4
