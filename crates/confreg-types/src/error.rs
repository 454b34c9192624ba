//! Error type shared by all confreg crates.
//!
//! Every failure is one variant of [`Error`]. Adapters map their backend errors
//! into it, managers pass them through unchanged, and the HTTP layer turns
//! them into responses through the [`IntoResponse`] impl below.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type ClResult<T> = std::result::Result<T, Error>;

/// One schema violation found while validating a config document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
	pub message: String,
}

#[derive(Debug)]
pub enum Error {
	// Not found
	ConfigNotFound(String),
	SchemaNotFound(String),

	// Client errors
	ValidationError(String),
	ConfigValidation(Vec<ValidationIssue>),
	VersionMismatch {
		expected: u32,
		got: u32,
	},
	SchemaPathIsInvalid(String),

	// Lock misconfiguration
	LimitMismatch {
		key: String,
		established: u32,
		requested: u32,
	},

	// Infrastructure
	DbError,
	Parse,
	Internal(String),
	Io(std::io::Error),
}

impl Error {
	fn status_and_code(&self) -> (StatusCode, &'static str) {
		match self {
			Error::ConfigNotFound(_) => (StatusCode::NOT_FOUND, "E-CONFIG-NOT-FOUND"),
			Error::SchemaNotFound(_) => (StatusCode::NOT_FOUND, "E-SCHEMA-NOT-FOUND"),
			Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "E-VALIDATION"),
			Error::ConfigValidation(_) => (StatusCode::BAD_REQUEST, "E-CONFIG-VALIDATION"),
			Error::VersionMismatch { .. } => (StatusCode::CONFLICT, "E-VERSION-MISMATCH"),
			Error::SchemaPathIsInvalid(_) => (StatusCode::BAD_REQUEST, "E-SCHEMA-PATH"),
			Error::LimitMismatch { .. } => {
				(StatusCode::INTERNAL_SERVER_ERROR, "E-LOCK-LIMIT-MISMATCH")
			}
			Error::DbError | Error::Parse | Error::Internal(_) | Error::Io(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, "E-INTERNAL")
			}
		}
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::ConfigNotFound(what) => write!(f, "config not found: {}", what),
			Error::SchemaNotFound(id) => write!(f, "schema not found: {}", id),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigValidation(issues) => {
				write!(f, "config failed schema validation ({} issues)", issues.len())
			}
			Error::VersionMismatch { expected, got } => {
				write!(f, "version mismatch: expected {}, got {}", expected, got)
			}
			Error::SchemaPathIsInvalid(id) => write!(f, "schema path is invalid: {}", id),
			Error::LimitMismatch { key, established, requested } => write!(
				f,
				"lock limit mismatch for key '{}': established {}, requested {}",
				key, established, requested
			),
			Error::DbError => write!(f, "database error"),
			Error::Parse => write!(f, "parse error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		Self::Parse
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, code) = self.status_and_code();
		if status.is_server_error() {
			tracing::warn!(error = %self, "request failed");
		}

		// Internal details are not exposed to clients
		let message = match &self {
			Error::DbError | Error::Parse | Error::Internal(_) | Error::Io(_) => {
				"Internal server error".to_string()
			}
			other => other.to_string(),
		};
		let details = match &self {
			Error::ConfigValidation(issues) => serde_json::json!(issues),
			Error::VersionMismatch { expected, got } => {
				serde_json::json!({ "expected": expected, "got": got })
			}
			_ => serde_json::Value::Null,
		};

		let body = serde_json::json!({
			"error": {
				"code": code,
				"message": message,
				"details": details,
			}
		});
		(status, Json(body)).into_response()
	}
}


// vim: ts=4
