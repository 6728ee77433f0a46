//! Re-exports of the types most services need.

pub use crate::aide::Aide;
pub use crate::api_type;
pub use crate::crud::{Crud, CrudDriver, Model, StorageRegistry};
pub use crate::fault::Fault;
pub use crate::fixture::Fixture;
pub use crate::invoker::{handler, raw_handler, Handler};
pub use crate::modules::{mod_access_log, mod_slow_log, Authorizer, BoxHandler, Module};
pub use crate::sac::Sac;
pub use crate::server::RestServer;
pub use crate::service::{Service, ServiceDescriptor};
pub use crate::value::Value;
pub use aqua_cache::{CacheStore, InMemoryStore};
