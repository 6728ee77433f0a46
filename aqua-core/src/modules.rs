//! Per-endpoint middleware ("modules") and the authorizer hook.

use crate::http::Request;
use crate::invoker::ResponseFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A compiled request handler.
pub type BoxHandler = Arc<dyn Fn(Request) -> ResponseFuture + Send + Sync>;

/// A module wraps a handler into a new handler. Modules are registered on
/// the server by name and attached to endpoints through `fixture.modules`.
pub type Module = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Per-server authorization hook, consulted before dispatch.
///
/// `allow` and `deny` carry the endpoint's ACL expressions verbatim; their
/// interpretation belongs to the implementation. Returning `false` produces
/// a canned 401.
pub trait Authorizer: Send + Sync + 'static {
    fn authorize(&self, req: &Request, allow: &str, deny: &str) -> bool;
}

/// Logs every request with its duration, under the `aqua::access` target.
pub fn mod_access_log() -> Module {
    Arc::new(|next: BoxHandler| {
        let next = next.clone();
        Arc::new(move |req: Request| {
            let next = next.clone();
            let method = req.method().clone();
            let uri = req.uri().clone();
            Box::pin(async move {
                let start = Instant::now();
                let resp = next.as_ref()(req).await;
                tracing::info!(
                    target: "aqua::access",
                    %method,
                    %uri,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                );
                resp
            }) as ResponseFuture
        })
    })
}

/// Logs only requests slower than the given threshold, under the
/// `aqua::slow` target.
pub fn mod_slow_log(threshold: Duration) -> Module {
    Arc::new(move |next: BoxHandler| {
        let next = next.clone();
        Arc::new(move |req: Request| {
            let next = next.clone();
            let method = req.method().clone();
            let uri = req.uri().clone();
            Box::pin(async move {
                let start = Instant::now();
                let resp = next.as_ref()(req).await;
                let elapsed = start.elapsed();
                if elapsed > threshold {
                    tracing::warn!(
                        target: "aqua::slow",
                        %method,
                        %uri,
                        elapsed_secs = elapsed.as_secs_f64(),
                    );
                }
                resp
            }) as ResponseFuture
        })
    })
}
