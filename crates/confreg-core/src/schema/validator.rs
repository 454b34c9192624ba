//! JSON Schema validation of config documents
//!
//! Compiled validators are cached per schema id. `$ref`s a dereferenced
//! schema still holds (recursive schemas) resolve against the raw schema
//! documents handed in at compile time. Nothing is ever fetched.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use confreg_types::error::ValidationIssue;

use crate::prelude::*;

#[derive(Default)]
pub struct SchemaValidator {
	compiled: RwLock<HashMap<Box<str>, Arc<jsonschema::Validator>>>,
}

impl std::fmt::Debug for SchemaValidator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SchemaValidator").field("compiled", &self.compiled.read().len()).finish()
	}
}

impl SchemaValidator {
	pub fn new() -> Self {
		Self::default()
	}

	fn compiled(
		&self,
		schema_id: &str,
		schema: &Value,
		documents: &HashMap<String, Arc<Value>>,
	) -> ClResult<Arc<jsonschema::Validator>> {
		if let Some(validator) = self.compiled.read().get(schema_id) {
			return Ok(validator.clone());
		}

		let resources = documents
			.iter()
			.map(|(id, doc)| (id.as_str(), jsonschema::Resource::from_contents(Value::clone(doc))));
		let validator = jsonschema::options()
			.with_resources(resources)
			.build(schema)
			.map_err(|err| {
				error!("schema {} does not compile: {}", schema_id, err);
				Error::Internal(format!("schema {} does not compile", schema_id))
			})?;
		let validator = Arc::new(validator);
		self.compiled.write().insert(schema_id.into(), validator.clone());
		Ok(validator)
	}

	/// Checks `instance` against the schema, reporting every violation.
	///
	/// `documents` holds the raw schemas the `$ref`s of `schema` may point at.
	pub fn validate(
		&self,
		schema_id: &str,
		schema: &Value,
		documents: &HashMap<String, Arc<Value>>,
		instance: &Value,
	) -> ClResult<()> {
		let validator = self.compiled(schema_id, schema, documents)?;
		let issues: Vec<ValidationIssue> = validator
			.iter_errors(instance)
			.map(|err| ValidationIssue { message: err.to_string() })
			.collect();

		if issues.is_empty() {
			Ok(())
		} else {
			debug!("config rejected by schema {}: {} issue(s)", schema_id, issues.len());
			Err(Error::ConfigValidation(issues))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn schema() -> Value {
		json!({
			"type": "object",
			"properties": {
				"host": {"type": "string"},
				"port": {"type": "integer", "minimum": 1}
			},
			"required": ["host", "port"]
		})
	}

	#[test]
	fn test_valid_document() {
		let validator = SchemaValidator::new();
		let instance = json!({"host": "localhost", "port": 5432});
		let res = validator.validate("db", &schema(), &HashMap::new(), &instance);
		assert!(res.is_ok());
	}

	#[test]
	fn test_reports_every_issue() {
		let validator = SchemaValidator::new();
		let res = validator.validate("db", &schema(), &HashMap::new(), &json!({"host": 1, "port": 0}));
		match res {
			Err(Error::ConfigValidation(issues)) => assert_eq!(issues.len(), 2),
			other => panic!("expected ConfigValidation, got {:?}", other),
		}
	}

	#[test]
	fn test_recursive_ref_resolves_against_documents() {
		let id = "https://schemas.example.com/tree";
		let tree = json!({
			"type": "object",
			"properties": {"name": {"type": "string"}, "child": {"$ref": id}}
		});
		let documents = HashMap::from([(id.to_string(), Arc::new(tree.clone()))]);
		let validator = SchemaValidator::new();

		let valid = json!({"name": "a", "child": {"name": "b", "child": {"name": "c"}}});
		assert!(validator.validate(id, &tree, &documents, &valid).is_ok());

		let invalid = json!({"name": "a", "child": {"name": 2}});
		assert!(matches!(
			validator.validate(id, &tree, &documents, &invalid),
			Err(Error::ConfigValidation(_))
		));
	}

	#[test]
	fn test_unknown_remote_ref_is_not_fetched() {
		let schema = json!({"$ref": "https://schemas.example.com/elsewhere"});
		let validator = SchemaValidator::new();
		let res = validator.validate("svc", &schema, &HashMap::new(), &json!({}));
		assert!(matches!(res, Err(Error::Internal(_))));
	}

	#[test]
	fn test_broken_schema() {
		let validator = SchemaValidator::new();
		let res = validator.validate("bad", &json!({"type": 12}), &HashMap::new(), &json!({}));
		assert!(matches!(res, Err(Error::Internal(_))));
	}
}

// vim: ts=4
