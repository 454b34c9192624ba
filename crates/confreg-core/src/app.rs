//! App state type

use std::path::Path;
use std::sync::Arc;

use confreg_types::schema_manager::SchemaManager;

use crate::config::manager::ConfigManager;
use crate::lock::manager::LockManager;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct AppState {
	pub opts: AppBuilderOpts,

	pub lock_manager: LockManager,
	pub config_manager: ConfigManager,
	pub schema_manager: Arc<dyn SchemaManager>,
}

pub type App = Arc<AppState>;

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub listen: Box<str>,
	/// Directory holding `<path>.schema.json` files
	pub schema_dir: Box<Path>,
	/// Schema ids are `<schema_base_uri><path>`
	pub schema_base_uri: Box<str>,
	/// Upper bound of the random seconds added to lock retry hints
	pub lock_retry_jitter: u32,
}

// vim: ts=4
