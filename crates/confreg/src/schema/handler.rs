//! Schema REST endpoints

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;

use crate::extract::ValidQuery;
use crate::prelude::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSchemaQuery {
	pub id: String,
	#[serde(default)]
	pub should_dereference: bool,
}

/// GET /schema - Read a schema, optionally with external `$ref`s inlined
pub async fn get_schema(
	State(app): State<App>,
	ValidQuery(query): ValidQuery<GetSchemaQuery>,
) -> ClResult<Json<Value>> {
	debug!(id = %query.id, dereference = query.should_dereference, "GET /schema");

	let schema = app.schema_manager.get_schema(&query.id, query.should_dereference).await?;
	Ok(Json(Value::clone(&schema)))
}

// vim: ts=4
