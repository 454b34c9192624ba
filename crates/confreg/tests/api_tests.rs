//! HTTP API tests
//!
//! Requests go through the full router with a SQLite adapter and a manual
//! clock underneath.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use confreg::app::{App, AppBuilder};
use confreg::lock_adapter::LockAdapter;
use confreg::routes;
use confreg::types::{ManualClock, Timestamp};
use confreg_meta_adapter_sqlite::MetaAdapterSqlite;

const BASE: &str = "https://schemas.example.com/";

struct TestApp {
	app: App,
	adapter: Arc<MetaAdapterSqlite>,
	clock: Arc<ManualClock>,
	_db_dir: TempDir,
	_schema_dir: TempDir,
}

async fn create_test_app() -> TestApp {
	let db_dir = TempDir::new().expect("Failed to create temp directory");
	let schema_dir = TempDir::new().expect("Failed to create temp directory");
	std::fs::write(
		schema_dir.path().join("db.schema.json"),
		r#"{"type": "object", "properties": {"port": {"type": "integer"}}, "required": ["port"]}"#,
	)
	.expect("write schema");
	std::fs::write(
		schema_dir.path().join("service.schema.json"),
		format!(r#"{{"type": "object", "properties": {{"db": {{"$ref": "{}db"}}}}}}"#, BASE),
	)
	.expect("write schema");

	let clock = Arc::new(ManualClock::new(Timestamp(1_700_000_000_000)));
	let adapter = Arc::new(
		MetaAdapterSqlite::with_clock(db_dir.path(), clock.clone())
			.await
			.expect("Failed to create adapter"),
	);

	let mut builder = AppBuilder::new();
	builder
		.schema_dir(schema_dir.path())
		.schema_base_uri(BASE)
		.clock(clock.clone())
		.lock_adapter(adapter.clone())
		.config_adapter(adapter.clone());
	let app = builder.build().expect("Failed to build app");

	TestApp { app, adapter, clock, _db_dir: db_dir, _schema_dir: schema_dir }
}

async fn send(app: &App, method: Method, uri: &str, body: Option<Value>) -> Response {
	let mut req = Request::builder().method(method).uri(uri);
	let body = match body {
		Some(body) => {
			req = req.header(header::CONTENT_TYPE, "application/json");
			Body::from(body.to_string())
		}
		None => Body::empty(),
	};
	routes::init(app.clone())
		.oneshot(req.body(body).expect("request"))
		.await
		.expect("response")
}

async fn json_body(res: Response) -> Value {
	let bytes = res.into_body().collect().await.expect("body").to_bytes();
	serde_json::from_slice(&bytes).expect("json body")
}

fn lock(key: &str, caller_id: &str, ttl: i64, limit: i64) -> Option<Value> {
	Some(json!({"key": key, "callerId": caller_id, "ttl": ttl, "limit": limit}))
}

#[tokio::test]
async fn test_lock_scenario() {
	let t = create_test_app().await;

	let res = send(&t.app, Method::POST, "/locks", lock("job", "c1", 60, 2)).await;
	assert_eq!(res.status(), StatusCode::OK);
	let res = send(&t.app, Method::POST, "/locks", lock("job", "c2", 60, 2)).await;
	assert_eq!(res.status(), StatusCode::OK);

	let res = send(&t.app, Method::POST, "/locks", lock("job", "c3", 60, 2)).await;
	assert_eq!(res.status(), StatusCode::LOCKED);
	let retry_after: u32 = res
		.headers()
		.get(header::RETRY_AFTER)
		.expect("Retry-After header")
		.to_str()
		.expect("ascii")
		.parse()
		.expect("seconds");
	assert!(retry_after > 0 && retry_after <= 60);
	let body = json_body(res).await;
	assert_eq!(body["acquired"], json!(false));
	assert_eq!(body["activeCount"], json!(2));

	let res = send(&t.app, Method::DELETE, "/locks/job/c1", None).await;
	assert_eq!(res.status(), StatusCode::NO_CONTENT);

	let res = send(&t.app, Method::POST, "/locks", lock("job", "c3", 60, 2)).await;
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_lock_ttl_scenario() {
	let t = create_test_app().await;

	let res = send(&t.app, Method::POST, "/locks", lock("job", "c1", 10, 1)).await;
	assert_eq!(res.status(), StatusCode::OK);

	t.clock.advance(Duration::from_secs(11));
	let res = send(&t.app, Method::POST, "/locks", lock("job", "c2", 10, 1)).await;
	assert_eq!(res.status(), StatusCode::OK);

	let locks = t.adapter.list_locks("job").await.expect("list");
	assert_eq!(locks.len(), 1);
	assert_eq!(locks[0].caller_id.as_ref(), "c2");
}

#[tokio::test]
async fn test_lock_validation() {
	let t = create_test_app().await;

	let invalid = [
		lock("", "c1", 10, 1),
		lock("job", "", 10, 1),
		lock("job", "c1", 0, 1),
		lock("job", "c1", 10, -1),
		Some(json!({"key": "job", "callerId": "c1", "ttl": 10})),
		Some(json!({"key": "job", "callerId": "c1", "ttl": "10", "limit": 1})),
	];
	for body in invalid {
		let res = send(&t.app, Method::POST, "/locks", body.clone()).await;
		assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{:?}", body);
		let body = json_body(res).await;
		assert_eq!(body["error"]["code"], json!("E-VALIDATION"));
	}

	assert!(t.adapter.list_locks("job").await.expect("list").is_empty());
}

#[tokio::test]
async fn test_release_unknown_lock() {
	let t = create_test_app().await;

	let res = send(&t.app, Method::DELETE, "/locks/job/nobody", None).await;
	assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_config_roundtrip() {
	let t = create_test_app().await;
	let db_schema = format!("{}db", BASE);
	let svc_schema = format!("{}service", BASE);

	let res = send(
		&t.app,
		Method::POST,
		"/config",
		Some(json!({"configName": "pg", "schemaId": db_schema, "version": 1, "config": {"port": 5432}})),
	)
	.await;
	assert_eq!(res.status(), StatusCode::CREATED);
	let pg = json_body(res).await;
	assert_eq!(pg["isLatest"], json!(true));
	assert_eq!(pg["configSchemaVersion"], json!("v1"));

	let svc_body = json!({"db": {"$ref": {"configName": "pg", "schemaId": db_schema, "version": "latest"}}});
	let res = send(
		&t.app,
		Method::POST,
		"/config",
		Some(json!({
			"configName": "svc",
			"schemaId": svc_schema,
			"version": 1,
			"config": svc_body,
			"createdBy": "alice"
		})),
	)
	.await;
	assert_eq!(res.status(), StatusCode::CREATED);
	let svc = json_body(res).await;
	assert_eq!(svc["createdBy"], json!("alice"));

	let uri = format!("/config/svc/latest?schemaId={}", svc_schema);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(json_body(res).await["config"], svc_body);

	let uri = format!("/config/svc/1?schemaId={}&shouldDereference=true", svc_schema);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::OK);
	assert_eq!(json_body(res).await["config"], json!({"db": {"port": 5432}}));

	// A new pg version changes the hash of svc, which follows it
	let res = send(
		&t.app,
		Method::POST,
		"/config",
		Some(json!({"configName": "pg", "schemaId": db_schema, "version": 2, "config": {"port": 6543}})),
	)
	.await;
	assert_eq!(res.status(), StatusCode::CREATED);
	let uri = format!("/config/svc/1?schemaId={}", svc_schema);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_ne!(json_body(res).await["hash"], svc["hash"]);
}

#[tokio::test]
async fn test_config_errors() {
	let t = create_test_app().await;
	let db_schema = format!("{}db", BASE);

	let res = send(
		&t.app,
		Method::POST,
		"/config",
		Some(json!({"configName": "pg", "schemaId": db_schema, "version": 1, "config": {"port": "x"}})),
	)
	.await;
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
	let body = json_body(res).await;
	assert_eq!(body["error"]["code"], json!("E-CONFIG-VALIDATION"));
	assert!(body["error"]["details"].as_array().is_some_and(|d| !d.is_empty()));

	let res = send(
		&t.app,
		Method::POST,
		"/config",
		Some(json!({"configName": "pg", "schemaId": db_schema, "version": 2, "config": {"port": 1}})),
	)
	.await;
	assert_eq!(res.status(), StatusCode::CONFLICT);
	assert_eq!(json_body(res).await["error"]["details"], json!({"expected": 1, "got": 2}));

	let uri = format!("/config/pg/latest?schemaId={}", db_schema);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::NOT_FOUND);

	let res = send(&t.app, Method::GET, "/config/pg/latest", None).await;
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);

	let uri = format!("/config/pg/zero?schemaId={}", db_schema);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_schema() {
	let t = create_test_app().await;

	let uri = format!("/schema?id={}service&shouldDereference=true", BASE);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::OK);
	let schema = json_body(res).await;
	assert_eq!(schema["properties"]["db"]["required"], json!(["port"]));

	let uri = format!("/schema?id={}missing", BASE);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::NOT_FOUND);

	let uri = format!("/schema?id={}../secrets", BASE);
	let res = send(&t.app, Method::GET, &uri, None).await;
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// vim: ts=4
