mod common;

use aqua_core::crud::{CrudDriver, DataError, ModelMeta, RowQuery};
use aqua_core::prelude::*;
use aqua_core::serde_json::{json, Map as JsonMap, Value as Json};
use common::TestApp;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(serde::Serialize, serde::Deserialize)]
struct Order {
    #[serde(default)]
    id: i64,
    item: String,
    #[serde(default)]
    quantity: i64,
}

aqua_core::api_type!(Order => "tests.Order");

impl Model for Order {
    fn table_name() -> &'static str {
        "orders"
    }
}

/// A scriptable driver that records every call it receives.
#[derive(Clone, Default)]
struct RecordingDriver {
    rows: Arc<Mutex<Vec<Json>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingDriver {
    fn new() -> RecordingDriver {
        RecordingDriver::default()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait::async_trait]
impl CrudDriver for RecordingDriver {
    async fn read(&self, meta: &ModelMeta, pkey: &str) -> Result<Json, DataError> {
        self.record(format!("read {} {pkey}", meta.table));
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row["id"].to_string() == pkey)
            .cloned()
            .ok_or_else(|| DataError::NotFound(pkey.to_string()))
    }

    async fn create(&self, meta: &ModelMeta, row: Json) -> Result<u64, DataError> {
        self.record(format!("create {}", meta.table));
        self.rows.lock().unwrap().push(row);
        Ok(1)
    }

    async fn update(
        &self,
        meta: &ModelMeta,
        pkey: &str,
        columns: JsonMap<String, Json>,
    ) -> Result<u64, DataError> {
        self.record(format!("update {} {pkey}", meta.table));
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if row["id"].to_string() == pkey {
                if let Json::Object(obj) = row {
                    for (col, val) in &columns {
                        obj.insert(col.clone(), val.clone());
                    }
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, meta: &ModelMeta, pkey: &str) -> Result<u64, DataError> {
        self.record(format!("delete {} {pkey}", meta.table));
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row["id"].to_string() != pkey);
        Ok((before - rows.len()) as u64)
    }

    async fn select(&self, meta: &ModelMeta, query: RowQuery) -> Result<Vec<Json>, DataError> {
        self.record(format!(
            "select {} where=[{}] params={} limit={} offset={}",
            meta.table,
            query.where_clause,
            query.params.len(),
            query.limit,
            query.offset
        ));
        Ok(self.rows.lock().unwrap().clone())
    }
}

struct OrderService;

impl Service for OrderService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("OrderService")
            .tag(r#"root:"-""#)
            .crud("foo", "", || {
                Crud::new("mysql", "dsn://orders").model::<Order>().with_rows()
            })
    }
}

fn crud_app(driver: RecordingDriver) -> TestApp {
    let mut server = RestServer::new();
    server.storage().add_driver("mysql", driver);
    server.add_service(OrderService);
    TestApp::new(server)
}

#[tokio::test]
async fn create_runs_the_sql_create_path() {
    let driver = RecordingDriver::new();
    let app = crud_app(driver.clone());

    let resp = app.post_json("/foo", r#"{"item": "kettle", "quantity": 2}"#).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["rows_affected"], 1);
    assert_eq!(resp.json()["success"], 1);
    assert_eq!(driver.calls(), vec!["create orders"]);
}

#[tokio::test]
async fn create_rejects_malformed_bodies() {
    let driver = RecordingDriver::new();
    let app = crud_app(driver.clone());

    // `item` is mandatory on the model
    let resp = app.post_json("/foo", r#"{"quantity": 2}"#).await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json()["message"], "Invalid create payload");
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn read_returns_the_row() {
    let driver = RecordingDriver::new();
    driver
        .rows
        .lock()
        .unwrap()
        .push(json!({"id": 42, "item": "lamp", "quantity": 1}));
    let app = crud_app(driver.clone());

    let resp = app.get("/foo/42").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["item"], "lamp");
    assert_eq!(driver.calls(), vec!["read orders 42"]);
}

#[tokio::test]
async fn read_miss_is_an_error_envelope() {
    let driver = RecordingDriver::new();
    let app = crud_app(driver);

    let resp = app.get("/foo/9").await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.json()["message"], "Oops! An error occurred");
}

#[tokio::test]
async fn update_applies_columns() {
    let driver = RecordingDriver::new();
    driver
        .rows
        .lock()
        .unwrap()
        .push(json!({"id": 7, "item": "mug", "quantity": 1}));
    let app = crud_app(driver.clone());

    let resp = app.put_json("/foo/7", r#"{"quantity": 5}"#).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["rows_affected"], 1);
    assert_eq!(driver.rows.lock().unwrap()[0]["quantity"], 5);
}

#[tokio::test]
async fn delete_emits_the_success_envelope() {
    let driver = RecordingDriver::new();
    driver
        .rows
        .lock()
        .unwrap()
        .push(json!({"id": 7, "item": "mug"}));
    let app = crud_app(driver.clone());

    let resp = app.delete("/foo/7").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["success"], 1);
    assert!(driver.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn raw_sql_body_is_passed_through() {
    let driver = RecordingDriver::new();
    driver
        .rows
        .lock()
        .unwrap()
        .push(json!({"id": 1, "item": "a"}));
    let app = crud_app(driver.clone());

    let resp = app.post("/foo/!", "text/plain", "item = 'a'").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()[0]["item"], "a");
    assert_eq!(
        driver.calls(),
        vec!["select orders where=[item = 'a'] params=0 limit=0 offset=1"]
    );
}

#[tokio::test]
async fn sql_json_defaults_limit_and_offset() {
    let driver = RecordingDriver::new();
    let app = crud_app(driver.clone());

    let resp = app
        .post_json("/foo/$", r#"{"where": "item = ?", "params": ["a"]}"#)
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        driver.calls(),
        vec!["select orders where=[item = ?] params=1 limit=100 offset=1"]
    );
}

#[tokio::test]
async fn sql_json_type_mismatches_are_400s() {
    let driver = RecordingDriver::new();
    let app = crud_app(driver.clone());

    let resp = app.post_json("/foo/$", r#"{"limit": "ten"}"#).await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json()["message"], "'limit' must be an integer");

    let resp = app.post_json("/foo/$", r#"{"order": [3]}"#).await;
    assert_eq!(resp.status, 400);
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn master_storage_fills_blank_descriptors() {
    struct MasterService;
    impl Service for MasterService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("MasterService")
                .tag(r#"root:"-""#)
                .crud("bar", "", || Crud::new("", "").model::<Order>())
        }
    }

    let driver = RecordingDriver::new();
    driver.rows.lock().unwrap().push(json!({"id": 1, "item": "x"}));
    let mut server = RestServer::new();
    server.storage().add_driver("postgres", driver.clone());
    server.storage().set_master("postgres", "dsn://master");
    server.add_service(MasterService);
    let app = TestApp::new(server);

    assert_eq!(app.get("/bar/1").await.status, 200);
    assert_eq!(driver.calls(), vec!["read orders 1"]);
}

#[tokio::test]
async fn unregistered_engine_fails_at_startup() {
    struct LonelyService;
    impl Service for LonelyService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("LonelyService")
                .crud("baz", "", || Crud::new("mysql", "dsn://x").model::<Order>())
        }
    }

    let mut server = RestServer::new();
    server.add_service(LonelyService);
    let err = server.load_all_endpoints().unwrap_err();
    assert_eq!(err.to_string(), "Storage driver mysql is not registered");
}

#[tokio::test]
async fn unknown_engine_fails_at_startup() {
    struct MongoService;
    impl Service for MongoService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("MongoService")
                .crud("docs", "", || Crud::new("mongodb", "dsn://x").model::<Order>())
        }
    }

    let mut server = RestServer::new();
    server.add_service(MongoService);
    let err = server.load_all_endpoints().unwrap_err();
    assert_eq!(err.to_string(), "No crud support for engine: mongodb");
}
