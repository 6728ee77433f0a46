//! Facade over the Aqua crates: core runtime, cache stores, and the
//! storage drivers, behind feature flags.
//!
//! ```ignore
//! use aqua::prelude::*;
//!
//! struct HelloService;
//!
//! impl Service for HelloService {
//!     fn descriptor(&self) -> ServiceDescriptor {
//!         ServiceDescriptor::new("HelloService")
//!             .get("world", r#"url:"/world""#, handler(|| async { "hello" }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     aqua::init_tracing();
//!     let mut server = RestServer::new();
//!     server.add_service(HelloService);
//!     server.run().await
//! }
//! ```

pub use aqua_core::*;

pub use aqua_core::api_type;

pub use aqua_cache as cache;

#[cfg(feature = "data")]
pub use aqua_data as data;

pub mod prelude {
    pub use aqua_core::prelude::*;

    pub use aqua_cache::{CacheStore, InMemoryStore};

    #[cfg(feature = "data")]
    pub use aqua_data::prelude::*;
}
