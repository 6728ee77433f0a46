//! Aqua core: the service-to-endpoint compilation pipeline and dispatcher.
//!
//! A [`Service`] declares endpoint fields (marker + tag + handler); the
//! [`RestServer`] compiles each into an immutable [`Endpoint`] and routes
//! requests through authorization, path-variable coercion, an optional
//! response cache, and the output writer. `CRUD` fields expand into a full
//! storage-backed resource.

pub mod aide;
pub mod config;
pub mod core_service;
pub mod crud;
pub(crate) mod dispatch;
pub mod encdec;
pub mod endpoint;
pub mod error;
pub mod fault;
pub mod fixture;
pub mod http;
pub mod invoker;
pub mod modules;
pub mod prelude;
pub mod sac;
pub mod server;
pub mod service;
pub mod serving;
pub mod signature;
pub mod utils;
pub mod value;

pub use aide::Aide;
pub use config::ServerConfig;
pub use core_service::CoreService;
pub use crud::{Crud, CrudDriver, DataError, Model, ModelMeta, RowQuery, StorageRegistry};
pub use endpoint::Endpoint;
pub use error::SetupError;
pub use fault::Fault;
pub use fixture::{resolve_in_order, Fixture};
pub use invoker::{handler, raw_handler, Handler, MethodInvoker};
pub use modules::{mod_access_log, mod_slow_log, Authorizer, Module};
pub use sac::Sac;
pub use server::RestServer;
pub use service::{Service, ServiceDescriptor};
pub use signature::{sig_of, Sig};
pub use value::{ApiType, IntoValue, Value};

// Used by the `api_type!` macro expansion in downstream crates.
pub use serde_json;

pub use aqua_cache as cache;

/// Initialise the global `tracing` subscriber with a standard `fmt` layer.
///
/// Respects `RUST_LOG`; falls back to `info` when unset. Call once at the
/// start of `main`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().expect("filter")),
        )
        .init();
}
