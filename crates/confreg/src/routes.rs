use axum::{
	Router,
	routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::prelude::*;
use crate::{config, lock, schema};

pub fn init(app: App) -> Router {
	Router::new()
		.route("/locks", post(lock::handler::post_lock))
		.route("/locks/{key}/{caller_id}", delete(lock::handler::delete_lock))
		.route("/config", post(config::handler::post_config))
		.route("/config/{name}/{version}", get(config::handler::get_config))
		.route("/schema", get(schema::handler::get_schema))
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
