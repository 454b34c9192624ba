//! App builder - constructs and runs the confreg application

use std::path::PathBuf;
use std::sync::Arc;

use crate::config_adapter::ConfigAdapter;
use crate::lock_adapter::LockAdapter;
use crate::prelude::*;
use crate::routes;
use crate::schema_manager::SchemaManager;
use crate::types::SystemClock;
use confreg_core::config::manager::ConfigManager;
use confreg_core::lock::manager::{DEFAULT_MAX_JITTER_SECS, LockManager};
use confreg_core::schema::manager::FsSchemaManager;

pub use confreg_core::app::{App, AppBuilderOpts, AppState, VERSION};

pub struct AppBuilder {
	opts: AppBuilderOpts,
	clock: Arc<dyn Clock>,
	lock_adapter: Option<Arc<dyn LockAdapter>>,
	config_adapter: Option<Arc<dyn ConfigAdapter>>,
	schema_manager: Option<Arc<dyn SchemaManager>>,
}

impl AppBuilder {
	pub fn new() -> Self {
		AppBuilder {
			opts: AppBuilderOpts {
				listen: "127.0.0.1:8080".into(),
				schema_dir: PathBuf::from("./schemas").into(),
				schema_base_uri: "https://schemas.confreg.local/".into(),
				lock_retry_jitter: DEFAULT_MAX_JITTER_SECS,
			},
			clock: Arc::new(SystemClock),
			lock_adapter: None,
			config_adapter: None,
			schema_manager: None,
		}
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}

	pub fn schema_dir(&mut self, schema_dir: impl Into<Box<std::path::Path>>) -> &mut Self {
		self.opts.schema_dir = schema_dir.into();
		self
	}

	pub fn schema_base_uri(&mut self, schema_base_uri: impl Into<Box<str>>) -> &mut Self {
		self.opts.schema_base_uri = schema_base_uri.into();
		self
	}

	pub fn lock_retry_jitter(&mut self, secs: u32) -> &mut Self {
		self.opts.lock_retry_jitter = secs;
		self
	}

	pub fn clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
		self.clock = clock;
		self
	}

	// Adapters
	pub fn lock_adapter(&mut self, lock_adapter: Arc<dyn LockAdapter>) -> &mut Self {
		self.lock_adapter = Some(lock_adapter);
		self
	}

	pub fn config_adapter(&mut self, config_adapter: Arc<dyn ConfigAdapter>) -> &mut Self {
		self.config_adapter = Some(config_adapter);
		self
	}

	/// Overrides the filesystem schema manager built from the opts
	pub fn schema_manager(&mut self, schema_manager: Arc<dyn SchemaManager>) -> &mut Self {
		self.schema_manager = Some(schema_manager);
		self
	}

	/// Assembles the app state
	pub fn build(self) -> ClResult<App> {
		let Some(lock_adapter) = self.lock_adapter else {
			error!("FATAL: No lock adapter configured");
			return Err(Error::Internal("No lock adapter configured".to_string()));
		};
		let Some(config_adapter) = self.config_adapter else {
			error!("FATAL: No config adapter configured");
			return Err(Error::Internal("No config adapter configured".to_string()));
		};
		let schema_manager = self.schema_manager.unwrap_or_else(|| {
			Arc::new(FsSchemaManager::new(self.opts.schema_dir.to_path_buf(), &self.opts.schema_base_uri))
		});

		let lock_manager = LockManager::new(lock_adapter, self.clock)
			.with_max_jitter(self.opts.lock_retry_jitter);
		let config_manager = ConfigManager::new(config_adapter, schema_manager.clone());

		Ok(Arc::new(AppState { opts: self.opts, lock_manager, config_manager, schema_manager }))
	}

	pub async fn run(self) -> ClResult<()> {
		info!("confreg V{}", VERSION);

		let app = self.build()?;
		info!(
			"schemas: {} -> {}",
			app.opts.schema_base_uri,
			app.opts.schema_dir.display()
		);

		let router = routes::init(app.clone());
		let listener = tokio::net::TcpListener::bind(app.opts.listen.as_ref()).await?;
		info!("Listening on HTTP {}", app.opts.listen);
		axum::serve(listener, router).await?;

		Ok(())
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4
