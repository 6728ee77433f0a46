//! Thin re-export layer over axum. The rest of the crate goes through this
//! module so the HTTP dependency has a single owner.

pub use axum::http::Uri;
pub use axum::{serve, Json, Router};
pub use bytes::Bytes;

pub use axum::body::Body;
pub use axum::extract::{Multipart, Query, RawPathParams, Request};
pub use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE,
};
pub use axum::http::{Method, StatusCode};
pub use axum::response::{IntoResponse, Response};
pub use axum::routing::MethodFilter;
