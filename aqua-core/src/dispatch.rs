//! Per-request dispatch.
//!
//! Compiles an [`Endpoint`] into a boxed handler running the request
//! pipeline: authorization → mux-var coercion → optional Aide → optional
//! response cache → invocation → output writing. Modules wrap the result.

use crate::aide::{Aide, MULTIPART_BODY_LIMIT};
use crate::encdec;
use crate::endpoint::Endpoint;
use crate::http::{
    Body, Bytes, Method, RawPathParams, Request, Response, StatusCode, CONTENT_LENGTH,
    CONTENT_TYPE,
};
use crate::modules::BoxHandler;
use crate::serving::{json_response, write_output};
use crate::signature::Sig;
use crate::value::Value;
use axum::extract::FromRequestParts;
use http_body_util::BodyExt;
use std::sync::Arc;

/// Compile an endpoint into its request handler, modules applied.
pub(crate) fn compile_endpoint(ep: Arc<Endpoint>) -> BoxHandler {
    let base: BoxHandler = if !ep.fixture.stub.is_empty() {
        let stub = ep.fixture.stub.clone();
        Arc::new(move |_req| {
            let stub = stub.clone();
            Box::pin(async move { serve_stub(&stub).await })
        })
    } else {
        let ep = ep.clone();
        Arc::new(move |req| {
            let ep = ep.clone();
            Box::pin(async move { handle_incoming(ep, req).await })
        })
    };

    // First declared module ends up outermost.
    let mut handler = base;
    for module in ep.modules.iter().rev() {
        handler = module.as_ref()(handler);
    }
    handler
}

async fn serve_stub(path: &str) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))
            .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(_) => json_response(
            StatusCode::BAD_REQUEST,
            &serde_json::json!({ "message": format!("Error reading stub content {path}") }),
            false,
        ),
    }
}

async fn handle_incoming(ep: Arc<Endpoint>, req: Request) -> Response {
    // Authorization
    if let Some(auth) = &ep.auth {
        if !auth.authorize(&req, &ep.fixture.allow, &ep.fixture.deny) {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &serde_json::json!({"message": "Unauthorized Access"}),
                false,
            );
        }
    }

    // Standard handlers take the request whole; no caching.
    if ep.std_handler {
        if let Some(raw) = ep.invoker.raw_fn() {
            return raw.as_ref()(req).await;
        }
    }

    let method = req.method().clone();
    let request_uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let (mut parts, body) = req.into_parts();

    // Mux variables, in declared order.
    let raw_params = RawPathParams::from_request_parts(&mut parts, &()).await.ok();
    let mut vars: Vec<String> = Vec::with_capacity(ep.mux_vars.len());
    for name in &ep.mux_vars {
        let value = raw_params
            .as_ref()
            .and_then(|params| {
                params
                    .iter()
                    .find(|(key, _)| *key == name.as_str())
                    .map(|(_, value)| value.to_string())
            })
            .unwrap_or_default();
        vars.push(value);
    }
    for (idx, pattern) in ep.mux_patterns.iter().enumerate() {
        if let Some(re) = pattern {
            if !re.is_match(&vars[idx]) {
                return empty_response(StatusCode::NOT_FOUND);
            }
        }
    }

    let args = match convert_to_type(&vars, &ep.invoker.inp_sigs) {
        Ok(args) => args,
        Err(message) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({ "message": message }),
                false,
            )
        }
    };

    let aide = if ep.needs_aide {
        let raw_body = if method == Method::POST || method == Method::PUT {
            collect_body(&parts, body).await
        } else {
            None
        };
        Some(Aide::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
            raw_body,
        ))
    } else {
        None
    };

    let ttl = ep.cache_ttl.unwrap_or_default();
    let use_cache = method == Method::GET && !ttl.is_zero() && ep.stash.is_some();
    let out_sigs = &ep.invoker.out_sigs;

    let out: Vec<Value> = if use_cache {
        let stash = ep.stash.as_ref().expect("cache store bound");
        match stash.get(&request_uri).await {
            Some(cached) => match encdec::decode(&cached, out_sigs) {
                Ok(vals) => vals,
                Err(err) => panic!("endpoint cache decode failed: {err}"),
            },
            None => {
                let out = ep.invoker.invoke(args, aide).await;
                let mut store = true;
                if out.len() == 2 && out_sigs.first() == Some(&Sig::Int) {
                    if let Some(Value::Int(code)) = out.first() {
                        if *code < 200 || *code > 299 {
                            store = false;
                        }
                    }
                }
                if store {
                    let buf = match encdec::encode(&out, out_sigs) {
                        Ok(buf) => buf,
                        Err(err) => panic!("endpoint cache encode failed: {err}"),
                    };
                    stash.set(&request_uri, buf, ttl).await;
                }
                out
            }
        }
    } else {
        ep.invoker.invoke(args, aide).await
    };

    write_output(&method, out_sigs, &out, ep.fixture.wants_pretty())
}

/// Collect the request body for Aide. Multipart bodies are capped in memory;
/// an overrun leaves the body empty.
async fn collect_body(parts: &http::request::Parts, body: Body) -> Option<Bytes> {
    let is_multipart = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data;"))
        .unwrap_or(false);
    if is_multipart {
        let limited = http_body_util::Limited::new(body, MULTIPART_BODY_LIMIT);
        limited.collect().await.ok().map(|c| c.to_bytes())
    } else {
        body.collect().await.ok().map(|c| c.to_bytes())
    }
}

/// Coerce captured mux-var strings into typed argument values.
pub(crate) fn convert_to_type(vars: &[String], sigs: &[Sig]) -> Result<Vec<Value>, String> {
    let mut out = Vec::with_capacity(vars.len());
    for (var, sig) in vars.iter().zip(sigs) {
        match sig {
            Sig::Str => out.push(Value::Str(var.clone())),
            Sig::Int => match var.parse::<i64>() {
                Ok(i) => out.push(Value::Int(i)),
                Err(_) => return Err(format!("Cannot convert [{var}] to 'int'")),
            },
            Sig::Uint => match var.parse::<u64>() {
                Ok(u) => out.push(Value::Uint(u)),
                Err(_) => return Err(format!("Cannot convert [{var}] to 'uint'")),
            },
            other => return Err(format!("Type [{other}] is not supported")),
        }
    }
    Ok(out)
}

pub(crate) fn empty_response(status: StatusCode) -> Response {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}
