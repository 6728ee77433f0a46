//! Server assembly: services in, routing table out, listener on top.

use crate::core_service::CoreService;
use crate::crud::{expand_crud, StorageRegistry};
use crate::dispatch::{compile_endpoint, empty_response};
use crate::endpoint::Endpoint;
use crate::error::SetupError;
use crate::fixture::{resolve_in_order, Fixture};
use crate::http::{MethodFilter, Request, Response, Router, StatusCode, ACCEPT};
use crate::invoker::{Handler, HandlerKind, MethodInvoker};
use crate::modules::{Authorizer, BoxHandler, Module};
use crate::service::{DeclHandler, Service, ServiceDescriptor};
use crate::signature::Sig;
use crate::utils::{sentence_case, strip_route_var_patterns, url_case};
use aqua_cache::CacheStore;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

const DEFAULT_PORT: u16 = 8090;

/// One path's per-method dispatch entry: the directly registered endpoint
/// plus any content-negotiated version aliases.
#[derive(Default)]
struct MethodGroup {
    direct: Option<BoxHandler>,
    aliases: Vec<(String, String, BoxHandler)>,
}

/// The REST server: aggregates services, modules, caches, storage, and an
/// authorizer; compiles everything into a routing table at `run`.
pub struct RestServer {
    /// Server-level fixture defaults (lowest resolution precedence).
    pub fixture: Fixture,
    /// Bind address, combined with `port`.
    pub addr: String,
    pub port: u16,

    svcs: Vec<Arc<dyn Service>>,
    mods: HashMap<String, Module>,
    stores: HashMap<String, Arc<dyn CacheStore>>,
    storage: StorageRegistry,
    auth: Option<Arc<dyn Authorizer>>,
    /// Routing table, `METHOD:url` → endpoint. Append-only until the
    /// listener starts, read-only after.
    apis: HashMap<String, Arc<Endpoint>>,
    loaded: bool,
}

impl RestServer {
    pub fn new() -> RestServer {
        let mut server = RestServer {
            fixture: Fixture {
                pretty: "false".into(),
                vendor: "vnd.api".into(),
                ..Fixture::default()
            },
            addr: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            svcs: Vec::new(),
            mods: HashMap::new(),
            stores: HashMap::new(),
            storage: StorageRegistry::new(),
            auth: None,
            apis: HashMap::new(),
            loaded: false,
        };
        server.add_service(CoreService);
        server
    }

    pub fn add_service(&mut self, svc: impl Service) {
        self.svcs.push(Arc::new(svc));
    }

    /// Register a named module. Must happen before a service referencing it
    /// is compiled.
    pub fn add_module(&mut self, name: &str, module: Module) {
        self.mods.insert(name.to_string(), module);
    }

    /// Register a named cache store for `fixture.cache` bindings.
    pub fn add_cache(&mut self, name: &str, store: impl CacheStore) {
        self.stores.insert(name.to_string(), Arc::new(store));
    }

    pub fn set_auth(&mut self, auth: impl Authorizer) {
        self.auth = Some(Arc::new(auth));
    }

    /// The storage registry backing CRUD fields.
    pub fn storage(&mut self) -> &mut StorageRegistry {
        &mut self.storage
    }

    /// Compiled endpoints, keyed by `METHOD:url`. Empty before
    /// [`load_all_endpoints`](Self::load_all_endpoints).
    pub fn endpoints(&self) -> &HashMap<String, Arc<Endpoint>> {
        &self.apis
    }

    /// Compile every added service into the routing table. Idempotent.
    pub fn load_all_endpoints(&mut self) -> Result<(), SetupError> {
        if self.loaded {
            return Ok(());
        }
        tracing::info!("loading endpoints");
        let svcs = self.svcs.clone();
        for svc in &svcs {
            self.load_service_endpoints(svc.descriptor())?;
        }
        self.loaded = true;
        Ok(())
    }

    fn load_service_endpoints(&mut self, desc: ServiceDescriptor) -> Result<(), SetupError> {
        let fix_svc_tag = Fixture::from_tag(&desc.tag);
        let fix_svc_obj = desc.fixture.clone();
        let svc_name = desc.name.clone();

        for decl in desc.endpoints {
            let fix_field = Fixture::from_tag(&decl.tag);
            let mut fix =
                resolve_in_order(&[&fix_field, &fix_svc_tag, &fix_svc_obj, &self.fixture]);

            // Fill missing root and url from the service and field names.
            if fix.root.is_empty() {
                let name = svc_name.strip_suffix("Service").unwrap_or(&svc_name);
                fix.root = url_case(name);
            } else if fix.root == "-" {
                fix.root.clear();
            }
            if fix.url.is_empty() {
                fix.url = url_case(&decl.field);
            }

            let method_name = sentence_case(&decl.field);

            match decl.handler {
                DeclHandler::Crud(factory) => {
                    // Validate the declaration shape the same way any other
                    // endpoint is validated.
                    let marker = MethodInvoker::new(
                        &svc_name,
                        &method_name,
                        Handler::from_parts(Vec::new(), vec![Sig::crud()], HandlerKind::None),
                    );
                    Endpoint::new(
                        marker,
                        fix.clone(),
                        "CRUD",
                        &self.mods,
                        &self.stores,
                        self.auth.clone(),
                    )?;

                    let mut crud = factory();
                    crud.use_master_if_missing(&self.storage);
                    crud.validate(&self.storage)?;

                    for (method, f, invoker) in
                        expand_crud(&svc_name, &crud, &fix, &self.storage)?
                    {
                        let ep = Endpoint::new(
                            invoker,
                            f,
                            method,
                            &self.mods,
                            &self.stores,
                            self.auth.clone(),
                        )?;
                        self.add_to_list(ep)?;
                    }
                }
                DeclHandler::Typed(handler) => {
                    let invoker = MethodInvoker::new(&svc_name, &method_name, handler);
                    let ep = Endpoint::new(
                        invoker,
                        fix,
                        decl.marker,
                        &self.mods,
                        &self.stores,
                        self.auth.clone(),
                    )?;
                    self.add_to_list(ep)?;
                }
                DeclHandler::None => {
                    // A declared field with no method only routes as a stub.
                    if fix.stub.is_empty() {
                        continue;
                    }
                    let invoker = MethodInvoker::missing(&svc_name, &method_name);
                    let ep = Endpoint::new(
                        invoker,
                        fix,
                        decl.marker,
                        &self.mods,
                        &self.stores,
                        self.auth.clone(),
                    )?;
                    self.add_to_list(ep)?;
                }
            }
        }
        Ok(())
    }

    fn add_to_list(&mut self, ep: Endpoint) -> Result<(), SetupError> {
        if self.apis.contains_key(&ep.svc_id) {
            return Err(SetupError::DuplicateRoute {
                svc_id: ep.svc_id.clone(),
            });
        }
        tracing::info!(target: "aqua::routes", "{}", ep.svc_id);
        self.apis.insert(ep.svc_id.clone(), Arc::new(ep));
        Ok(())
    }

    /// Compile services (if needed) and assemble the router.
    pub fn into_router(mut self) -> Result<Router, SetupError> {
        self.load_all_endpoints()?;

        // Group endpoints by path, then by method, attaching versioned
        // endpoints to their unversioned URL through Accept-header aliases.
        let mut groups: HashMap<String, HashMap<String, MethodGroup>> = HashMap::new();
        for ep in self.apis.values() {
            let handler = compile_endpoint(ep.clone());
            let primary = strip_route_var_patterns(&ep.svc_url);
            let entry = groups
                .entry(primary)
                .or_default()
                .entry(ep.http_method.clone())
                .or_default();
            if entry.direct.is_some() {
                return Err(SetupError::DuplicateRoute {
                    svc_id: ep.svc_id.clone(),
                });
            }
            entry.direct = Some(handler.clone());

            if !ep.fixture.version.is_empty() {
                let alias_path = strip_route_var_patterns(&ep.url_wo_version);
                let (accept1, accept2) = ep.accept_aliases();
                groups
                    .entry(alias_path)
                    .or_default()
                    .entry(ep.http_method.clone())
                    .or_default()
                    .aliases
                    .push((accept1, accept2, handler));
            }
        }

        let mut router = Router::new();
        for (path, methods) in groups {
            let mut method_router = axum::routing::MethodRouter::new();
            for (method, group) in methods {
                let group = Arc::new(group);
                let handler = move |req: Request| {
                    let group = group.clone();
                    async move { dispatch_group(group, req).await }
                };
                method_router = method_router.on(method_filter(&method), handler);
            }
            router = router.route(&path, method_router);
        }

        Ok(router.layer(CatchPanicLayer::custom(panic_response)))
    }

    /// Compile and serve until Ctrl-C / SIGTERM.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", self.addr, self.port);
        let router = self.into_router()?;
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "aqua server listening");
        crate::http::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("aqua server stopped");
        Ok(())
    }

    /// Serve on a background task.
    pub fn run_async(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run().await {
                tracing::error!(%err, "aqua server failed");
            }
        })
    }
}

impl Default for RestServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch_group(group: Arc<MethodGroup>, req: Request) -> Response {
    let accept = req
        .headers()
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    for (accept1, accept2, handler) in &group.aliases {
        if accept == *accept1 || accept == *accept2 {
            return handler.as_ref()(req).await;
        }
    }
    if let Some(direct) = &group.direct {
        return direct.as_ref()(req).await;
    }
    empty_response(StatusCode::NOT_FOUND)
}

fn method_filter(method: &str) -> MethodFilter {
    match method {
        "GET" => MethodFilter::GET,
        "POST" => MethodFilter::POST,
        "PUT" => MethodFilter::PUT,
        "PATCH" => MethodFilter::PATCH,
        "DELETE" => MethodFilter::DELETE,
        other => {
            tracing::error!(method = other, "unexpected http method, routing as GET");
            MethodFilter::GET
        }
    }
}

fn panic_response(_err: Box<dyn std::any::Any + Send>) -> Response {
    crate::serving::json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({ "message": "Internal server error" }),
        false,
    )
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl-C");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
