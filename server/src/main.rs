//! confreg server
//!
//! Configured from the environment:
//!
//! - `LISTEN`: address to bind (default `127.0.0.1:8080`)
//! - `DB_DIR`: directory of the SQLite database (default `./data`)
//! - `SCHEMA_DIR`: directory the schema files are read from (default `./schemas`)
//! - `SCHEMA_BASE_URI`: URI prefix of schema ids
//! - `LOCK_RETRY_JITTER`: maximum jitter added to retry hints, in seconds
//! - `RUST_LOG`: log filter

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use confreg::AppBuilder;
use confreg::error::{ClResult, Error};
use confreg_meta_adapter_sqlite::MetaAdapterSqlite;
use tracing::error;

pub struct Config {
	pub listen: Option<String>,
	pub db_dir: PathBuf,
	pub schema_dir: Option<PathBuf>,
	pub schema_base_uri: Option<String>,
	pub lock_retry_jitter: Option<u32>,
}

impl Config {
	fn from_env() -> ClResult<Self> {
		let lock_retry_jitter = match env::var("LOCK_RETRY_JITTER") {
			Ok(value) => Some(value.parse::<u32>().map_err(|_| {
				Error::ValidationError(format!(
					"LOCK_RETRY_JITTER must be a non-negative integer, got '{}'",
					value
				))
			})?),
			Err(_) => None,
		};

		Ok(Config {
			listen: env::var("LISTEN").ok(),
			db_dir: PathBuf::from(env::var("DB_DIR").unwrap_or_else(|_| "./data".to_string())),
			schema_dir: env::var("SCHEMA_DIR").ok().map(PathBuf::from),
			schema_base_uri: env::var("SCHEMA_BASE_URI").ok(),
			lock_retry_jitter,
		})
	}
}

async fn run(config: Config) -> ClResult<()> {
	let adapter = Arc::new(MetaAdapterSqlite::new(&config.db_dir).await?);

	let mut builder = AppBuilder::new();
	builder.lock_adapter(adapter.clone()).config_adapter(adapter);
	if let Some(listen) = config.listen {
		builder.listen(listen);
	}
	if let Some(schema_dir) = config.schema_dir {
		builder.schema_dir(schema_dir);
	}
	if let Some(schema_base_uri) = config.schema_base_uri {
		builder.schema_base_uri(schema_base_uri);
	}
	if let Some(jitter) = config.lock_retry_jitter {
		builder.lock_retry_jitter(jitter);
	}

	builder.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let res = match Config::from_env() {
		Ok(config) => run(config).await,
		Err(err) => Err(err),
	};
	match res {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("FATAL: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
