//! Filesystem Schema Manager
//!
//! Schema ids are URIs under a configured base. The id `<base><path>` maps to
//! the file `<root>/<path>.schema.json`. Parsed schemas are cached for the
//! lifetime of the manager, both raw and dereferenced.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use confreg_types::schema_manager::SchemaManager;

use crate::prelude::*;

const SCHEMA_EXT: &str = ".schema.json";

#[derive(Debug)]
pub struct FsSchemaManager {
	root: PathBuf,
	base_uri: Box<str>,
	raw: RwLock<HashMap<Box<str>, Arc<Value>>>,
	dereferenced: RwLock<HashMap<Box<str>, Arc<Value>>>,
}

impl FsSchemaManager {
	pub fn new(root: impl Into<PathBuf>, base_uri: &str) -> Self {
		let base_uri = if base_uri.ends_with('/') { base_uri.to_string() } else { format!("{}/", base_uri) };
		Self {
			root: root.into(),
			base_uri: base_uri.into(),
			raw: RwLock::new(HashMap::new()),
			dereferenced: RwLock::new(HashMap::new()),
		}
	}

	/// Maps a schema id to its file, rejecting ids that leave the schema root
	pub fn schema_path(&self, id: &str) -> ClResult<PathBuf> {
		let rel = id
			.strip_prefix(self.base_uri.as_ref())
			.ok_or_else(|| Error::SchemaNotFound(id.to_string()))?;
		if rel.is_empty() || rel.contains('\\') || rel.contains('#') {
			return Err(Error::SchemaPathIsInvalid(id.to_string()));
		}

		let rel_path = Path::new(rel);
		if !rel_path.components().all(|c| matches!(c, Component::Normal(_))) {
			return Err(Error::SchemaPathIsInvalid(id.to_string()));
		}

		Ok(self.root.join(format!("{}{}", rel, SCHEMA_EXT)))
	}

	async fn load(&self, id: &str) -> ClResult<Arc<Value>> {
		if let Some(schema) = self.raw.read().get(id) {
			return Ok(schema.clone());
		}

		let path = self.schema_path(id)?;
		let text = match tokio::fs::read_to_string(&path).await {
			Ok(text) => text,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				return Err(Error::SchemaNotFound(id.to_string()));
			}
			Err(err) => return Err(err.into()),
		};
		let schema: Value = serde_json::from_str(&text).map_err(|err| {
			warn!("schema {} at {} is not valid JSON: {}", id, path.display(), err);
			Error::Parse
		})?;
		debug!("loaded schema {} from {}", id, path.display());

		let schema = Arc::new(schema);
		self.raw.write().insert(id.into(), schema.clone());
		Ok(schema)
	}

	/// Loads `id` and every schema it references under the base URI
	async fn load_closure(&self, id: &str) -> ClResult<HashMap<String, Arc<Value>>> {
		let mut loaded = HashMap::new();
		let mut pending = vec![id.to_string()];
		while let Some(next) = pending.pop() {
			if loaded.contains_key(&next) {
				continue;
			}
			let schema = self.load(&next).await?;
			collect_external_refs(&schema, &self.base_uri, &mut pending);
			loaded.insert(next, schema);
		}
		Ok(loaded)
	}
}

/// Splits `<doc>#<fragment>`
fn split_ref(r: &str) -> (&str, &str) {
	r.split_once('#').unwrap_or((r, ""))
}

fn collect_external_refs(value: &Value, base_uri: &str, out: &mut Vec<String>) {
	match value {
		Value::Object(obj) => {
			if let Some(Value::String(r)) = obj.get("$ref") {
				let (doc, _) = split_ref(r);
				if doc.starts_with(base_uri) {
					out.push(doc.to_string());
				}
			}
			for item in obj.values() {
				collect_external_refs(item, base_uri, out);
			}
		}
		Value::Array(items) => {
			for item in items {
				collect_external_refs(item, base_uri, out);
			}
		}
		_ => {}
	}
}

/// Inlines `$ref`s that point at registered schemas.
///
/// Local refs (`#/...`) of an inlined document are rebased onto that
/// document. `stack` holds the refs being inlined; a ref back into one of
/// them is recursion and stays a `$ref`, made absolute.
struct Inliner<'a> {
	base_uri: &'a str,
	root: &'a str,
	loaded: &'a HashMap<String, Arc<Value>>,
}

impl Inliner<'_> {
	fn inline(&self, value: &Value, doc: &str, stack: &mut Vec<String>) -> ClResult<Value> {
		match value {
			Value::Object(obj) => {
				if let Some(Value::String(r)) = obj.get("$ref") {
					if let Some(res) = self.inline_ref(obj, r, doc, stack)? {
						return Ok(res);
					}
				}

				let mut res = serde_json::Map::with_capacity(obj.len());
				for (k, v) in obj {
					res.insert(k.clone(), self.inline(v, doc, stack)?);
				}
				Ok(Value::Object(res))
			}
			Value::Array(items) => Ok(Value::Array(
				items.iter().map(|v| self.inline(v, doc, stack)).collect::<ClResult<_>>()?,
			)),
			other => Ok(other.clone()),
		}
	}

	fn inline_ref(
		&self,
		obj: &serde_json::Map<String, Value>,
		r: &str,
		doc: &str,
		stack: &mut Vec<String>,
	) -> ClResult<Option<Value>> {
		let local = r.starts_with('#');
		// Local refs of the root document still resolve after inlining
		if local && doc == self.root {
			return Ok(None);
		}

		let target_ref = if local { format!("{}{}", doc, r) } else { r.to_string() };
		let (target_doc, fragment) = split_ref(&target_ref);
		if !target_doc.starts_with(self.base_uri) {
			return Ok(None);
		}

		if stack.iter().any(|s| *s == target_ref) {
			let mut res = serde_json::Map::with_capacity(obj.len());
			for (k, v) in obj {
				let v = if k == "$ref" { Value::String(target_ref.clone()) } else { self.inline(v, doc, stack)? };
				res.insert(k.clone(), v);
			}
			return Ok(Some(Value::Object(res)));
		}

		let target = self
			.loaded
			.get(target_doc)
			.ok_or_else(|| Error::SchemaNotFound(target_doc.to_string()))?;
		let target = if fragment.is_empty() {
			target.as_ref()
		} else {
			target.pointer(fragment).ok_or_else(|| Error::SchemaNotFound(target_ref.clone()))?
		};

		stack.push(target_ref.clone());
		let res = self.inline(target, target_doc, stack);
		stack.pop();
		res.map(Some)
	}
}

#[async_trait]
impl SchemaManager for FsSchemaManager {
	async fn get_schema(&self, id: &str, dereference: bool) -> ClResult<Arc<Value>> {
		if !dereference {
			return self.load(id).await;
		}
		if let Some(schema) = self.dereferenced.read().get(id) {
			return Ok(schema.clone());
		}

		let loaded = self.load_closure(id).await?;
		let root = loaded.get(id).ok_or_else(|| Error::SchemaNotFound(id.to_string()))?;
		let inliner = Inliner { base_uri: &self.base_uri, root: id, loaded: &loaded };
		let mut stack = vec![id.to_string()];
		let schema = Arc::new(inliner.inline(root, id, &mut stack)?);

		self.dereferenced.write().insert(id.into(), schema.clone());
		Ok(schema)
	}

	async fn get_schema_closure(&self, id: &str) -> ClResult<HashMap<String, Arc<Value>>> {
		self.load_closure(id).await
	}
}


// vim: ts=4
