//! Resolves schema ids to JSON Schema documents.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::prelude::*;

#[async_trait]
pub trait SchemaManager: Debug + Send + Sync {
	/// Loads the schema registered under `id`.
	///
	/// With `dereference` set, `$ref`s pointing at other registered schemas are
	/// inlined. Fails with `Error::SchemaNotFound` if the id does not resolve
	/// and `Error::SchemaPathIsInvalid` if it points outside the schema root.
	async fn get_schema(&self, id: &str, dereference: bool) -> ClResult<Arc<Value>>;

	/// Raw documents of `id` and of every registered schema it references,
	/// transitively, keyed by schema id. Validators resolve the `$ref`s left
	/// in a dereferenced schema against these.
	async fn get_schema_closure(&self, id: &str) -> ClResult<HashMap<String, Arc<Value>>>;
}

// vim: ts=4
