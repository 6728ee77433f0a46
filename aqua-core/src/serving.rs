//! Output writer: turns a handler's return-value list into an HTTP response.

use crate::fault::Fault;
use crate::http::{Body, Method, Response, StatusCode, CONTENT_LENGTH, CONTENT_TYPE};
use crate::signature::{sig_of, Sig};
use crate::value::Value;
use serde_json::Value as Json;

/// Translate returned values into status + headers + body.
///
/// - one return: a lone `int` becomes the status with no body, anything else
///   goes through the single-item writer;
/// - two returns: `(int, X)` writes the status then `X`; `(X, error)` writes
///   `X` unless the error is non-nil, in which case the error wins.
pub fn write_output(method: &Method, sigs: &[Sig], vals: &[Value], pretty: bool) -> Response {
    match (sigs.len(), vals.len()) {
        (1, 1) => {
            if sigs[0] == Sig::Int {
                if let Value::Int(code) = &vals[0] {
                    return status_only(*code);
                }
            }
            write_item(method, &sigs[0], &vals[0], pretty)
        }
        (2, 2) => {
            if sigs[0] == Sig::Int {
                let mut resp = write_item(method, &sigs[1], &vals[1], pretty);
                if let Value::Int(code) = &vals[0] {
                    *resp.status_mut() = status_code(*code);
                }
                resp
            } else if sigs[1] == Sig::ErrorIface {
                if matches!(vals[1], Value::Nil) {
                    write_item(method, &sigs[0], &vals[0], pretty)
                } else {
                    write_item(method, &sigs[1], &vals[1], pretty)
                }
            } else {
                tracing::error!(?sigs, "unsupported two-return format");
                empty_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
        _ => {
            tracing::error!(sigs = sigs.len(), vals = vals.len(), "return arity mismatch");
            empty_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Write a single returned item.
fn write_item(method: &Method, sig: &Sig, val: &Value, pretty: bool) -> Response {
    // Pointers: dereference and recurse on the pointee's signature.
    if matches!(sig, Sig::StructPtr(_) | Sig::SlicePtr(_)) {
        return match val {
            Value::Ptr(inner) => write_item(method, &sig_of(inner), inner, pretty),
            other => {
                tracing::error!(sig = %sig, val = ?other, "pointer signature without pointer value");
                empty_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
    }

    // Dynamic checks come first, as in the reflective original: a Sac, Fault
    // or error value is recognized whatever the declared signature says.
    match val {
        Value::Sac(sac) => {
            return write_item(method, &Sig::Map, &Value::Map(sac.data.clone()), pretty);
        }
        Value::Fault(fault) => return write_fault(method, fault, pretty),
        Value::Error(issue) => {
            let fault = Fault {
                message: "Oops! An error occurred".into(),
                issue: Some(issue.clone()),
                ..Fault::default()
            };
            return write_fault(method, &fault, pretty);
        }
        _ => {}
    }

    match sig {
        Sig::Str => text_response(match val {
            Value::Str(s) => s.clone(),
            other => to_json(other).to_string(),
        }),
        Sig::Map | Sig::Struct(_) | Sig::Slice(_) | Sig::Array(_) => {
            json_response(StatusCode::OK, &to_json(val), pretty)
        }
        Sig::AnyIface | Sig::ErrorIface => {
            if matches!(val, Value::Nil) {
                // nil error: conventional success envelope
                return json_response(StatusCode::OK, &serde_json::json!({"success": 1}), pretty);
            }
            write_item(method, &sig_of(val), val, pretty)
        }
        other => {
            tracing::error!(sig = %other, "don't know how to return this signature");
            empty_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn write_fault(method: &Method, fault: &Fault, pretty: bool) -> Response {
    let status = match fault.http_code {
        Some(code) => status_code(i64::from(code)),
        // 417: expectation failed
        None if *method == Method::GET => StatusCode::NOT_FOUND,
        None if *method == Method::POST || *method == Method::DELETE => {
            StatusCode::EXPECTATION_FAILED
        }
        None if *method == Method::PUT => status_code(444),
        None => {
            tracing::error!(%method, "status code missing for method");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_response(status, &to_json(&Value::Fault(fault.clone())), pretty)
}

/// Project a runtime value onto plain JSON.
pub(crate) fn to_json(val: &Value) -> Json {
    match val {
        Value::Nil => Json::Null,
        Value::Int(i) => Json::from(*i),
        Value::Uint(u) => Json::from(*u),
        Value::Str(s) => Json::from(s.clone()),
        Value::Map(m) => Json::Object(m.clone()),
        Value::Struct { body, .. } => body.clone(),
        Value::Slice { items, .. } => items.clone(),
        Value::Ptr(inner) => to_json(inner),
        Value::Sac(sac) => Json::Object(sac.data.clone()),
        Value::Fault(fault) => serde_json::to_value(fault).unwrap_or(Json::Null),
        Value::Error(msg) => Json::from(msg.clone()),
    }
}

fn status_code(code: i64) -> StatusCode {
    u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn status_only(code: i64) -> Response {
    empty_status(status_code(code))
}

fn empty_status(status: StatusCode) -> Response {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}

fn text_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap_or_else(|_| empty_status(StatusCode::INTERNAL_SERVER_ERROR))
}

pub(crate) fn json_response(status: StatusCode, json: &Json, pretty: bool) -> Response {
    let bytes = if pretty {
        serde_json::to_vec_pretty(json)
    } else {
        serde_json::to_vec(json)
    }
    .unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .unwrap_or_else(|_| empty_status(StatusCode::INTERNAL_SERVER_ERROR))
}
