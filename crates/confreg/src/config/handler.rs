//! Config REST endpoints

use axum::{
	Json,
	extract::{Path, State},
	http::StatusCode,
};
use serde::Deserialize;

use crate::config_adapter::Config;
use crate::extract::{ValidJson, ValidQuery};
use crate::prelude::*;
use confreg_core::config::manager::CreateConfigRequest;

/// Query parameters for reading a config
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigQuery {
	pub schema_id: String,
	#[serde(default)]
	pub should_dereference: bool,
}

/// Parses a version path segment: a positive integer or `latest`
fn parse_version(version: &str) -> ClResult<Option<u32>> {
	if version == "latest" {
		return Ok(None);
	}
	match version.parse::<u32>() {
		Ok(v) if v > 0 => Ok(Some(v)),
		_ => Err(Error::ValidationError(format!(
			"version must be a positive integer or \"latest\", got '{}'",
			version
		))),
	}
}

/// POST /config - Store a new config version
pub async fn post_config(
	State(app): State<App>,
	ValidJson(req): ValidJson<CreateConfigRequest>,
) -> ClResult<(StatusCode, Json<Config>)> {
	info!(
		config_name = %req.config_name,
		schema_id = %req.schema_id,
		version = req.version,
		"POST /config"
	);

	let config = app.config_manager.create_config(req).await?;
	Ok((StatusCode::CREATED, Json(config)))
}

/// GET /config/{name}/{version} - Read a config version
pub async fn get_config(
	State(app): State<App>,
	Path((name, version)): Path<(String, String)>,
	ValidQuery(query): ValidQuery<GetConfigQuery>,
) -> ClResult<Json<Config>> {
	let version = parse_version(&version)?;
	debug!(
		config_name = %name,
		schema_id = %query.schema_id,
		version = ?version,
		dereference = query.should_dereference,
		"GET /config"
	);

	let config = app
		.config_manager
		.get_config(&name, &query.schema_id, version, query.should_dereference)
		.await?;
	Ok(Json(config))
}


// vim: ts=4
