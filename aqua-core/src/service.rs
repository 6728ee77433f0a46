//! The developer-facing service declaration surface.
//!
//! A service describes itself as a list of endpoint fields: each field has a
//! marker (the HTTP method), a tag string carrying the per-endpoint
//! metadata, and the handler. The handler method name is derived from the
//! field name, first letter uppercased; missing `root`/`url` default to the
//! kebab-cased service and field names.

use crate::crud::Crud;
use crate::fixture::Fixture;
use crate::invoker::Handler;
use std::sync::Arc;

/// A declarative REST service.
pub trait Service: Send + Sync + 'static {
    fn descriptor(&self) -> ServiceDescriptor;
}

pub(crate) type CrudFactory = Arc<dyn Fn() -> Crud + Send + Sync>;

pub(crate) enum DeclHandler {
    Typed(Handler),
    Crud(CrudFactory),
    /// Declared field with no method behind it (stub endpoints).
    None,
}

pub(crate) struct EndpointDecl {
    pub field: String,
    pub marker: &'static str,
    pub tag: String,
    pub handler: DeclHandler,
}

/// A service's declared shape: name, service-level tags, endpoint fields.
pub struct ServiceDescriptor {
    pub(crate) name: String,
    pub(crate) tag: String,
    pub(crate) fixture: Fixture,
    pub(crate) endpoints: Vec<EndpointDecl>,
}

impl ServiceDescriptor {
    /// Start a descriptor. `name` is the service type name; a trailing
    /// `Service` is stripped when deriving the default root.
    pub fn new(name: impl Into<String>) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.into(),
            tag: String::new(),
            fixture: Fixture::default(),
            endpoints: Vec::new(),
        }
    }

    /// Service-level tag string (the `RestService` field tag).
    pub fn tag(mut self, tag: &str) -> ServiceDescriptor {
        self.tag = tag.to_string();
        self
    }

    /// Service-level fixture defaults (the embedded fixture object).
    pub fn fixture(mut self, fixture: Fixture) -> ServiceDescriptor {
        self.fixture = fixture;
        self
    }

    fn push(mut self, marker: &'static str, field: &str, tag: &str, handler: DeclHandler) -> Self {
        self.endpoints.push(EndpointDecl {
            field: field.to_string(),
            marker,
            tag: tag.to_string(),
            handler,
        });
        self
    }

    pub fn get(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.push("GET", field, tag, DeclHandler::Typed(handler))
    }

    pub fn post(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.push("POST", field, tag, DeclHandler::Typed(handler))
    }

    pub fn put(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.push("PUT", field, tag, DeclHandler::Typed(handler))
    }

    pub fn patch(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.push("PATCH", field, tag, DeclHandler::Typed(handler))
    }

    pub fn delete(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.push("DELETE", field, tag, DeclHandler::Typed(handler))
    }

    /// Declare a CRUD field. The factory runs once at registration; the
    /// returned descriptor is validated and expanded into its endpoints.
    pub fn crud(
        self,
        field: &str,
        tag: &str,
        factory: impl Fn() -> Crud + Send + Sync + 'static,
    ) -> Self {
        self.push("CRUD", field, tag, DeclHandler::Crud(Arc::new(factory)))
    }

    /// Declare a stub field: the tag must carry `stub:"<path>"`; the file
    /// contents are served instead of a handler.
    pub fn stub(self, field: &str, tag: &str) -> Self {
        self.push("GET", field, tag, DeclHandler::None)
    }

    // Historical marker aliases.

    pub fn get_api(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.get(field, tag, handler)
    }

    pub fn post_api(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.post(field, tag, handler)
    }

    pub fn put_api(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.put(field, tag, handler)
    }

    pub fn patch_api(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.patch(field, tag, handler)
    }

    pub fn delete_api(self, field: &str, tag: &str, handler: Handler) -> Self {
        self.delete(field, tag, handler)
    }

    pub fn crud_api(
        self,
        field: &str,
        tag: &str,
        factory: impl Fn() -> Crud + Send + Sync + 'static,
    ) -> Self {
        self.crud(field, tag, factory)
    }
}
