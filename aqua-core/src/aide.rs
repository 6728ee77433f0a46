//! Per-request helper handed to handlers that declare it.

use crate::http::{Body, HeaderMap, Method, Multipart, Request, Uri, CONTENT_TYPE};
use axum::extract::FromRequest;
use bytes::Bytes;
use std::collections::HashMap;

/// In-memory cap for multipart bodies.
pub(crate) const MULTIPART_BODY_LIMIT: usize = 1024 * 1024;

const SEPARATOR: &str = ",";

/// Aide bundles the request view and lazily parsed post/query/body variables.
///
/// One Aide is created per request by the dispatcher; [`load_vars`](Aide::load_vars)
/// may be called at most once.
#[derive(Debug, Default, Clone)]
pub struct Aide {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,

    // variables
    pub post_vars: HashMap<String, String>,
    pub query_vars: HashMap<String, String>,
    pub body: String,

    raw_body: Option<Bytes>,
    loaded: bool,
}

impl Aide {
    pub(crate) fn new(method: Method, uri: Uri, headers: HeaderMap, raw_body: Option<Bytes>) -> Aide {
        Aide {
            method,
            uri,
            headers,
            raw_body,
            ..Aide::default()
        }
    }

    /// An Aide bound to no request. Useful in unit tests.
    pub fn detached() -> Aide {
        Aide::default()
    }

    /// Parse and populate `post_vars`, `query_vars`, and `body`.
    ///
    /// - `POST`/`PUT` with `application/x-www-form-urlencoded`: body pairs
    ///   become post vars, the query string becomes query vars.
    /// - `POST`/`PUT` with `multipart/form-data`: same, parsed as multipart.
    /// - Any other `POST`/`PUT` content type: the raw body is captured as a
    ///   string.
    /// - `GET`: query vars only.
    ///
    /// Duplicate keys are joined with `,`. For form requests, query vars
    /// exclude keys already claimed by post vars.
    ///
    /// # Panics
    ///
    /// Panics when called a second time on the same Aide.
    pub async fn load_vars(&mut self) {
        if self.loaded {
            panic!("Aide.load_vars can be called only once per request");
        }
        self.loaded = true;

        if self.method == Method::POST || self.method == Method::PUT {
            let ctype = self
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            if ctype == "application/x-www-form-urlencoded" {
                let body = self.raw_body.take().unwrap_or_default();
                self.post_vars = parse_form(&body);
                self.load_query_vars(true);
            } else if ctype.starts_with("multipart/form-data;") {
                let body = self.raw_body.take().unwrap_or_default();
                self.post_vars = parse_multipart(&ctype, body).await;
                self.load_query_vars(true);
            } else {
                let body = self.raw_body.take().unwrap_or_default();
                self.body = String::from_utf8_lossy(&body).into_owned();
            }
        } else if self.method == Method::GET {
            self.load_query_vars(false);
        }
    }

    /// Get a query variable, or an empty string when absent or not loaded.
    pub fn query_var(&self, key: &str) -> String {
        self.query_vars.get(key).cloned().unwrap_or_default()
    }

    /// Get a post variable, or an empty string when absent or not loaded.
    pub fn post_var(&self, key: &str) -> String {
        self.post_vars.get(key).cloned().unwrap_or_default()
    }

    fn load_query_vars(&mut self, skip_post_vars: bool) {
        let query = self.uri.query().unwrap_or("");
        let parsed = parse_form(query.as_bytes());
        for (key, val) in parsed {
            if skip_post_vars && self.post_vars.contains_key(&key) {
                continue;
            }
            self.query_vars.insert(key, val);
        }
    }
}

/// Parse urlencoded pairs, joining duplicate keys with `,`.
fn parse_form(input: &[u8]) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();
    for (key, val) in form_urlencoded::parse(input) {
        match out.get_mut(key.as_ref()) {
            Some(existing) => {
                existing.push_str(SEPARATOR);
                existing.push_str(&val);
            }
            None => {
                out.insert(key.into_owned(), val.into_owned());
            }
        }
    }
    out
}

/// Parse a multipart body by replaying it through the extractor.
/// Non-text fields and malformed parts are skipped.
async fn parse_multipart(ctype: &str, body: Bytes) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();

    let req = Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, ctype)
        .body(Body::from(body));
    let Ok(req) = req else {
        return out;
    };
    let Ok(mut multipart) = Multipart::from_request(req, &()).await else {
        return out;
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let Ok(text) = field.text().await else {
            continue;
        };
        match out.get_mut(&name) {
            Some(existing) => {
                existing.push_str(SEPARATOR);
                existing.push_str(&text);
            }
            None => {
                out.insert(name, text);
            }
        }
    }
    out
}
