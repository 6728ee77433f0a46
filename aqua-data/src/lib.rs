//! Storage drivers for Aqua's CRUD layer.
//!
//! `aqua-core` owns the driver surface ([`aqua_core::crud::CrudDriver`]);
//! this crate supplies what sits behind it:
//!
//! - [`query`]: SQL generation for ad-hoc row queries (dialect-aware
//!   placeholder renumbering, identifier checks), for real SQL backends.
//! - [`MemoryDriver`]: a reference relational driver, entirely in memory.
//! - [`KvDriver`]: a key-value driver with memcache semantics.
//!
//! Actual database and memcached clients stay outside the framework; a
//! backend crate implements `CrudDriver` and registers itself in the
//! server's [`StorageRegistry`](aqua_core::crud::StorageRegistry).

pub mod kv;
pub mod memory;
pub mod query;

pub use kv::KvDriver;
pub use memory::MemoryDriver;
pub use query::{build_select, Dialect, QueryError};

/// Re-exports of the most commonly used data types.
pub mod prelude {
    pub use crate::{build_select, Dialect, KvDriver, MemoryDriver};
    pub use aqua_core::crud::{CrudDriver, DataError, Model, ModelMeta, RowQuery, StorageRegistry};
}
