//! Key-value driver with memcache semantics: read, update, delete, keyed by
//! `table:pkey`, honoring the descriptor's storage TTL.

use aqua_core::crud::{CrudDriver, DataError, ModelMeta, RowQuery};
use dashmap::DashMap;
use serde_json::Map as JsonMap;
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Default)]
pub struct KvDriver {
    entries: Arc<DashMap<String, (Json, Option<Instant>)>>,
}

impl KvDriver {
    pub fn new() -> KvDriver {
        KvDriver::default()
    }

    /// Store a row directly, bypassing the driver surface. Useful for
    /// seeding.
    pub fn put(&self, table: &str, pkey: &str, row: Json) {
        self.entries
            .insert(entry_key(table, pkey), (row, None));
    }

    fn live(&self, key: &str) -> Option<Json> {
        let entry = self.entries.get(key)?;
        let (row, expires) = entry.value();
        if let Some(expires) = expires {
            if Instant::now() >= *expires {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
        }
        Some(row.clone())
    }
}

fn entry_key(table: &str, pkey: &str) -> String {
    format!("{table}:{pkey}")
}

#[async_trait::async_trait]
impl CrudDriver for KvDriver {
    async fn read(&self, meta: &ModelMeta, pkey: &str) -> Result<Json, DataError> {
        self.live(&entry_key(meta.table, pkey))
            .ok_or_else(|| DataError::NotFound(format!("{}:{pkey}", meta.table)))
    }

    async fn create(&self, _meta: &ModelMeta, _row: Json) -> Result<u64, DataError> {
        Err(DataError::Unsupported("create on a kv store".into()))
    }

    async fn update(
        &self,
        meta: &ModelMeta,
        pkey: &str,
        columns: JsonMap<String, Json>,
    ) -> Result<u64, DataError> {
        let key = entry_key(meta.table, pkey);
        let mut row = match self.live(&key) {
            Some(Json::Object(obj)) => obj,
            Some(_) | None => JsonMap::new(),
        };
        for (col, val) in columns {
            row.insert(col, val);
        }
        let expires = meta.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, (Json::Object(row), expires));
        Ok(1)
    }

    async fn delete(&self, meta: &ModelMeta, pkey: &str) -> Result<u64, DataError> {
        match self.entries.remove(&entry_key(meta.table, pkey)) {
            Some(_) => Ok(1),
            None => Ok(0),
        }
    }

    async fn select(&self, _meta: &ModelMeta, _query: RowQuery) -> Result<Vec<Json>, DataError> {
        Err(DataError::Unsupported("ad-hoc queries on a kv store".into()))
    }
}
