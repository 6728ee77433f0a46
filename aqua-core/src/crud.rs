//! The auto-derived CRUD layer.
//!
//! A `CRUD` field's method returns a [`Crud`] descriptor. The expander picks
//! a [`CrudDriver`] from the [`StorageRegistry`] and synthesizes up to six
//! endpoints over it: read, create, update, delete, plus the two ad-hoc
//! query endpoints (`POST {url}/!` raw WHERE, `POST {url}/$` JSON query).

use crate::aide::Aide;
use crate::error::SetupError;
use crate::fault::Fault;
use crate::fixture::Fixture;
use crate::invoker::{handler, MethodInvoker};
use crate::signature::Sig;
use crate::value::{ApiType, Value};
use serde_json::Map as JsonMap;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A persistable row type: serializable both ways, with table metadata.
pub trait Model: ApiType + serde::de::DeserializeOwned + Send + Sync + 'static {
    fn table_name() -> &'static str;
    fn primary_key() -> &'static str {
        "id"
    }
}

/// Table metadata handed to drivers alongside every call.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// Full type name, used for `st:` signatures of returned rows.
    pub name: &'static str,
    pub table: &'static str,
    pub pkey: &'static str,
    /// Connection string of the owning descriptor.
    pub conn: String,
    /// Storage TTL, for engines that expire rows.
    pub ttl: Option<Duration>,
}

/// An ad-hoc row query. `where_clause` and `params` are handed to the
/// driver verbatim; parameter substitution belongs to the SQL layer.
/// `offset` is 1-based (drivers skip `offset - 1` rows); `limit <= 0`
/// means unlimited.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    pub where_clause: String,
    pub params: Vec<Json>,
    pub limit: i64,
    pub offset: i64,
    pub order: Vec<String>,
}

/// Failures surfaced by storage drivers.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    /// The driver cannot run this action or query shape.
    Unsupported(String),
    Backend(String),
}

impl DataError {
    pub(crate) fn into_value(self) -> Value {
        Value::Error(self.to_string())
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "record not found: {msg}"),
            DataError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            DataError::Backend(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

/// The minimal adapter surface the core calls. Storage backends implement
/// this; everything else about them stays outside the framework.
#[async_trait::async_trait]
pub trait CrudDriver: Send + Sync + 'static {
    async fn read(&self, meta: &ModelMeta, pkey: &str) -> Result<Json, DataError>;
    async fn create(&self, meta: &ModelMeta, row: Json) -> Result<u64, DataError>;
    async fn update(
        &self,
        meta: &ModelMeta,
        pkey: &str,
        columns: JsonMap<String, Json>,
    ) -> Result<u64, DataError>;
    async fn delete(&self, meta: &ModelMeta, pkey: &str) -> Result<u64, DataError>;
    async fn select(&self, meta: &ModelMeta, query: RowQuery) -> Result<Vec<Json>, DataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudAction {
    Read,
    Create,
    Update,
    Delete,
    Sql,
    SqlJson,
}

const RELATIONAL_ACTIONS: [CrudAction; 6] = [
    CrudAction::Read,
    CrudAction::Create,
    CrudAction::Update,
    CrudAction::Delete,
    CrudAction::Sql,
    CrudAction::SqlJson,
];

const KV_ACTIONS: [CrudAction; 3] = [CrudAction::Read, CrudAction::Update, CrudAction::Delete];

/// Actions an engine supports, or `None` for an unknown engine.
pub fn engine_actions(engine: &str) -> Option<&'static [CrudAction]> {
    match engine {
        "mysql" | "maria" | "mariadb" | "postgres" | "sqlite3" => Some(&RELATIONAL_ACTIONS),
        "memcache" => Some(&KV_ACTIONS),
        _ => None,
    }
}

/// Registry of storage drivers, injected into the server.
///
/// The optional master entry fills descriptors that leave both engine and
/// connection empty.
#[derive(Clone, Default)]
pub struct StorageRegistry {
    drivers: HashMap<String, Arc<dyn CrudDriver>>,
    master: Option<(String, String)>,
}

impl StorageRegistry {
    pub fn new() -> StorageRegistry {
        StorageRegistry::default()
    }

    /// Register a driver for an engine name. The same driver may be
    /// registered under several names (`maria`, `mariadb`, …).
    pub fn add_driver(&mut self, engine: &str, driver: impl CrudDriver) {
        self.drivers.insert(engine.to_string(), Arc::new(driver));
    }

    pub fn add_driver_arc(&mut self, engine: &str, driver: Arc<dyn CrudDriver>) {
        self.drivers.insert(engine.to_string(), driver);
    }

    /// Default engine + connection for descriptors that specify neither.
    pub fn set_master(&mut self, engine: &str, conn: &str) {
        self.master = Some((engine.to_string(), conn.to_string()));
    }

    pub fn driver(&self, engine: &str) -> Option<Arc<dyn CrudDriver>> {
        self.drivers.get(engine).cloned()
    }

    pub fn master(&self) -> Option<(&str, &str)> {
        self.master.as_ref().map(|(e, c)| (e.as_str(), c.as_str()))
    }
}

struct ModelShape {
    name: &'static str,
    table: &'static str,
    pkey: &'static str,
    /// Bind a JSON body into a fresh model, returning the validated row.
    bind: Arc<dyn Fn(&str) -> Result<Json, String> + Send + Sync>,
}

/// The CRUD descriptor returned by a `CRUD` field's method.
#[derive(Clone)]
pub struct Crud {
    pub engine: String,
    pub conn: String,
    /// Storage TTL for engines that expire rows (memcache).
    pub ttl: Option<Duration>,
    shape: Option<Arc<ModelShape>>,
    /// Whether the model exposes a row-slice target, enabling the ad-hoc
    /// query endpoints.
    has_rows: bool,
}

impl Crud {
    pub fn new(engine: impl Into<String>, conn: impl Into<String>) -> Crud {
        Crud {
            engine: engine.into(),
            conn: conn.into(),
            ttl: None,
            shape: None,
            has_rows: false,
        }
    }

    /// Bind the descriptor to a model type. The framework allocates a fresh
    /// model per create/update to validate incoming JSON.
    pub fn model<M: Model>(mut self) -> Crud {
        self.shape = Some(Arc::new(ModelShape {
            name: M::type_name(),
            table: M::table_name(),
            pkey: M::primary_key(),
            bind: Arc::new(|raw: &str| {
                let model: M = serde_json::from_str(raw).map_err(|e| e.to_string())?;
                serde_json::to_value(&model).map_err(|e| e.to_string())
            }),
        }));
        self
    }

    /// Also expose a row-slice target, enabling `POST {url}/!` and
    /// `POST {url}/$` on relational engines.
    pub fn with_rows(mut self) -> Crud {
        self.has_rows = true;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Crud {
        self.ttl = Some(ttl);
        self
    }

    pub(crate) fn use_master_if_missing(&mut self, registry: &StorageRegistry) {
        if self.engine.is_empty() && self.conn.is_empty() {
            if let Some((engine, conn)) = registry.master() {
                self.engine = engine.to_string();
                self.conn = conn.to_string();
            }
        }
    }

    pub(crate) fn validate(&self, registry: &StorageRegistry) -> Result<(), SetupError> {
        if self.engine.is_empty() {
            return Err(SetupError::BadStorage {
                reason: "Crud storage engine not specified".into(),
            });
        }
        if self.conn.is_empty() {
            return Err(SetupError::BadStorage {
                reason: "Crud connection not specified".into(),
            });
        }
        if self.shape.is_none() {
            return Err(SetupError::BadStorage {
                reason: "Crud model not specified".into(),
            });
        }
        if engine_actions(&self.engine).is_none() {
            return Err(SetupError::BadStorage {
                reason: format!("No crud support for engine: {}", self.engine),
            });
        }
        if registry.driver(&self.engine).is_none() {
            return Err(SetupError::BadStorage {
                reason: format!("Storage driver {} is not registered", self.engine),
            });
        }
        Ok(())
    }

    fn supports(&self, action: CrudAction) -> bool {
        let Some(actions) = engine_actions(&self.engine) else {
            return false;
        };
        if !actions.contains(&action) {
            return false;
        }
        match action {
            CrudAction::Sql | CrudAction::SqlJson => self.has_rows,
            _ => true,
        }
    }

    fn meta(&self) -> ModelMeta {
        let shape = self.shape.as_ref().expect("validated crud shape");
        ModelMeta {
            name: shape.name,
            table: shape.table,
            pkey: shape.pkey,
            conn: self.conn.clone(),
            ttl: self.ttl,
        }
    }
}

fn rows_affected(n: u64) -> Value {
    let mut map = JsonMap::new();
    map.insert("rows_affected".into(), Json::from(n));
    map.insert("success".into(), Json::from(1));
    Value::Map(map)
}

fn rows_value(name: &'static str, rows: Vec<Json>) -> Value {
    Value::Slice {
        elem: Sig::Struct(name.into()),
        items: Json::Array(rows),
    }
}

fn bad_request(issue: impl fmt::Display, message: &str) -> Value {
    Value::Fault(Fault::new(issue, message).status(400))
}

/// Synthesize endpoint declarations for a validated CRUD descriptor.
/// Returns `(http_method, fixture, invoker)` triples for the server to
/// compile like any other endpoint.
pub(crate) fn expand_crud(
    owner: &str,
    crud: &Crud,
    fix: &Fixture,
    registry: &StorageRegistry,
) -> Result<Vec<(&'static str, Fixture, MethodInvoker)>, SetupError> {
    let driver = registry
        .driver(&crud.engine)
        .ok_or_else(|| SetupError::BadStorage {
            reason: format!("Storage driver {} is not registered", crud.engine),
        })?;
    let shape = crud.shape.clone().ok_or_else(|| SetupError::BadStorage {
        reason: "Crud model not specified".into(),
    })?;
    let meta = Arc::new(crud.meta());
    let mut out = Vec::new();

    // GET {url}/{pkey}
    if crud.supports(CrudAction::Read) {
        let mut f = fix.clone();
        f.url.push_str("/{pkey}");
        let driver = driver.clone();
        let meta = meta.clone();
        let h = handler(move |pkey: String| {
            let driver = driver.clone();
            let meta = meta.clone();
            async move {
                match driver.read(&meta, &pkey).await {
                    Ok(row) => Value::Ptr(Box::new(Value::Struct {
                        name: meta.name.to_string(),
                        body: row,
                    })),
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("GET", f, MethodInvoker::new(owner, "CrudRead", h)));
    }

    // POST {url}
    if crud.supports(CrudAction::Create) {
        let f = fix.clone();
        let driver = driver.clone();
        let meta = meta.clone();
        let bind = shape.bind.clone();
        let h = handler(move |mut j: Aide| {
            let driver = driver.clone();
            let meta = meta.clone();
            let bind = bind.clone();
            async move {
                j.load_vars().await;
                let row = match bind.as_ref()(&j.body) {
                    Ok(row) => row,
                    Err(err) => return bad_request(err, "Invalid create payload"),
                };
                match driver.create(&meta, row).await {
                    Ok(n) => rows_affected(n),
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("POST", f, MethodInvoker::new(owner, "CrudCreate", h)));
    }

    // DELETE {url}/{pkey}
    if crud.supports(CrudAction::Delete) {
        let mut f = fix.clone();
        f.url.push_str("/{pkey}");
        let driver = driver.clone();
        let meta = meta.clone();
        let h = handler(move |pkey: String| {
            let driver = driver.clone();
            let meta = meta.clone();
            async move {
                match driver.delete(&meta, &pkey).await {
                    // nil error: the writer emits the success envelope
                    Ok(_) => Value::Nil,
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("DELETE", f, MethodInvoker::new(owner, "CrudDelete", h)));
    }

    // PUT {url}/{pkey}
    if crud.supports(CrudAction::Update) {
        let mut f = fix.clone();
        f.url.push_str("/{pkey}");
        let driver = driver.clone();
        let meta = meta.clone();
        let h = handler(move |pkey: String, mut j: Aide| {
            let driver = driver.clone();
            let meta = meta.clone();
            async move {
                j.load_vars().await;
                let columns = match serde_json::from_str::<Json>(&j.body) {
                    Ok(Json::Object(map)) => map,
                    Ok(_) => {
                        return bad_request("body is not an object", "Invalid update payload")
                    }
                    Err(err) => return bad_request(err, "Invalid update payload"),
                };
                match driver.update(&meta, &pkey, columns).await {
                    Ok(n) => rows_affected(n),
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("PUT", f, MethodInvoker::new(owner, "CrudUpdate", h)));
    }

    // POST {url}/!  raw WHERE fragment in the body, handed to the SQL
    // layer as-is (trusted input).
    if crud.supports(CrudAction::Sql) {
        let mut f = fix.clone();
        f.url.push_str("/!");
        let driver = driver.clone();
        let meta = meta.clone();
        let name = shape.name;
        let h = handler(move |mut j: Aide| {
            let driver = driver.clone();
            let meta = meta.clone();
            async move {
                j.load_vars().await;
                let query = RowQuery {
                    where_clause: j.body.trim().to_string(),
                    offset: 1,
                    ..RowQuery::default()
                };
                match driver.select(&meta, query).await {
                    Ok(rows) => rows_value(name, rows),
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("POST", f, MethodInvoker::new(owner, "CrudSql", h)));
    }

    // POST {url}/$  JSON query {where?, params?, limit?, offset?, order?}
    if crud.supports(CrudAction::SqlJson) {
        let mut f = fix.clone();
        f.url.push_str("/$");
        let driver = driver.clone();
        let meta = meta.clone();
        let name = shape.name;
        let h = handler(move |mut j: Aide| {
            let driver = driver.clone();
            let meta = meta.clone();
            async move {
                j.load_vars().await;
                let query = match parse_sql_json(&j.body) {
                    Ok(q) => q,
                    Err(fault) => return Value::Fault(fault),
                };
                match driver.select(&meta, query).await {
                    Ok(rows) => rows_value(name, rows),
                    Err(err) => err.into_value(),
                }
            }
        });
        out.push(("POST", f, MethodInvoker::new(owner, "CrudSqlJson", h)));
    }

    Ok(out)
}

/// Parse the `POST {url}/$` body. Defaults: `limit` 100, `offset` 1.
fn parse_sql_json(body: &str) -> Result<RowQuery, Fault> {
    let parsed: Json = serde_json::from_str(body)
        .map_err(|e| Fault::new(e, "Invalid query payload").status(400))?;
    let Json::Object(obj) = parsed else {
        return Err(Fault::with_message("Query payload must be a JSON object").status(400));
    };

    let where_clause = match obj.get("where") {
        None | Some(Json::Null) => String::new(),
        Some(Json::String(s)) => s.clone(),
        Some(_) => return Err(Fault::with_message("'where' must be a string").status(400)),
    };
    let params = match obj.get("params") {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(items)) => items.clone(),
        Some(_) => return Err(Fault::with_message("'params' must be an array").status(400)),
    };
    let limit = match obj.get("limit") {
        None | Some(Json::Null) => 100,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| Fault::with_message("'limit' must be an integer").status(400))?,
    };
    let offset = match obj.get("offset") {
        None | Some(Json::Null) => 1,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| Fault::with_message("'offset' must be an integer").status(400))?,
    };
    let order = match obj.get("order") {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::String(s)) => vec![s.clone()],
        Some(Json::Array(items)) => {
            let mut order = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::String(s) => order.push(s.clone()),
                    _ => {
                        return Err(
                            Fault::with_message("'order' items must be strings").status(400)
                        )
                    }
                }
            }
            order
        }
        Some(_) => {
            return Err(
                Fault::with_message("'order' must be a string or array of strings").status(400),
            )
        }
    };

    Ok(RowQuery {
        where_clause,
        params,
        limit,
        offset,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Pet {
        id: i64,
        name: String,
    }
    crate::api_type!(Pet => "tests.Pet");
    impl Model for Pet {
        fn table_name() -> &'static str {
            "pets"
        }
    }

    struct NullDriver;

    #[async_trait::async_trait]
    impl CrudDriver for NullDriver {
        async fn read(&self, _m: &ModelMeta, _p: &str) -> Result<Json, DataError> {
            Err(DataError::NotFound("null".into()))
        }
        async fn create(&self, _m: &ModelMeta, _r: Json) -> Result<u64, DataError> {
            Ok(1)
        }
        async fn update(
            &self,
            _m: &ModelMeta,
            _p: &str,
            _c: JsonMap<String, Json>,
        ) -> Result<u64, DataError> {
            Ok(1)
        }
        async fn delete(&self, _m: &ModelMeta, _p: &str) -> Result<u64, DataError> {
            Ok(1)
        }
        async fn select(&self, _m: &ModelMeta, _q: RowQuery) -> Result<Vec<Json>, DataError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> StorageRegistry {
        let mut reg = StorageRegistry::new();
        reg.add_driver("mysql", NullDriver);
        reg.add_driver("memcache", NullDriver);
        reg
    }

    #[test]
    fn engine_table_shapes() {
        assert_eq!(engine_actions("mysql").unwrap().len(), 6);
        assert_eq!(engine_actions("sqlite3").unwrap().len(), 6);
        assert_eq!(engine_actions("memcache").unwrap().len(), 3);
        assert!(engine_actions("mongodb").is_none());
    }

    #[test]
    fn master_fills_missing_engine_and_conn() {
        let mut reg = registry();
        reg.set_master("mysql", "db://main");
        let mut crud = Crud::new("", "").model::<Pet>();
        crud.use_master_if_missing(&reg);
        assert_eq!(crud.engine, "mysql");
        assert_eq!(crud.conn, "db://main");
    }

    #[test]
    fn validate_requires_everything() {
        let reg = registry();
        assert!(Crud::new("", "c").model::<Pet>().validate(&reg).is_err());
        assert!(Crud::new("mysql", "").model::<Pet>().validate(&reg).is_err());
        assert!(Crud::new("mysql", "c").validate(&reg).is_err());
        assert!(Crud::new("mongodb", "c").model::<Pet>().validate(&reg).is_err());
        assert!(Crud::new("postgres", "c").model::<Pet>().validate(&reg).is_err()); // no driver
        assert!(Crud::new("mysql", "c").model::<Pet>().validate(&reg).is_ok());
    }

    #[test]
    fn relational_expansion_yields_six_endpoints() {
        let reg = registry();
        let crud = Crud::new("mysql", "c").model::<Pet>().with_rows();
        let fix = Fixture {
            url: "pet".into(),
            ..Fixture::default()
        };
        let eps = expand_crud("PetService", &crud, &fix, &reg).unwrap();
        let summary: Vec<(String, String)> = eps
            .iter()
            .map(|(m, f, _)| (m.to_string(), f.url.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GET".to_string(), "pet/{pkey}".to_string()),
                ("POST".to_string(), "pet".to_string()),
                ("DELETE".to_string(), "pet/{pkey}".to_string()),
                ("PUT".to_string(), "pet/{pkey}".to_string()),
                ("POST".to_string(), "pet/!".to_string()),
                ("POST".to_string(), "pet/$".to_string()),
            ]
        );
    }

    #[test]
    fn no_rows_no_query_endpoints() {
        let reg = registry();
        let crud = Crud::new("mysql", "c").model::<Pet>();
        let fix = Fixture::default();
        let eps = expand_crud("PetService", &crud, &fix, &reg).unwrap();
        assert_eq!(eps.len(), 4);
    }

    #[test]
    fn memcache_expansion_is_read_update_delete() {
        let reg = registry();
        let crud = Crud::new("memcache", "c").model::<Pet>().with_rows();
        let fix = Fixture::default();
        let eps = expand_crud("PetService", &crud, &fix, &reg).unwrap();
        let methods: Vec<_> = eps.iter().map(|(m, _, _)| *m).collect();
        assert_eq!(methods, vec!["GET", "DELETE", "PUT"]);
    }

    #[test]
    fn sql_json_defaults_and_type_checks() {
        let q = parse_sql_json("{}").unwrap();
        assert_eq!(q.limit, 100);
        assert_eq!(q.offset, 1);
        assert!(q.where_clause.is_empty());

        let q = parse_sql_json(
            r#"{"where": "name = ?", "params": ["rex"], "limit": 5, "order": "id"}"#,
        )
        .unwrap();
        assert_eq!(q.where_clause, "name = ?");
        assert_eq!(q.params, vec![Json::from("rex")]);
        assert_eq!(q.limit, 5);
        assert_eq!(q.order, vec!["id"]);

        let fault = parse_sql_json(r#"{"limit": "ten"}"#).unwrap_err();
        assert_eq!(fault.http_code, Some(400));
        let fault = parse_sql_json(r#"{"order": [1]}"#).unwrap_err();
        assert_eq!(fault.http_code, Some(400));
    }
}
