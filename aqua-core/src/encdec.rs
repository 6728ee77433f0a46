//! Cache codec: a handler's return-value list as concatenated JSON records.
//!
//! One JSON record per value; `i:.` values take two records (the dynamic
//! signature, then the payload). Signatures outside the supported set are a
//! fatal error: the dispatcher panics rather than cache garbage.

use crate::signature::{sig_of, Sig};
use crate::value::Value;
use bytes::Bytes;
use serde_json::Value as Json;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncdecError {
    /// The signature is not cacheable.
    Unsupported(String),
    /// The value does not match its declared signature.
    Mismatch { sig: String, got: String },
    /// Underlying JSON failure.
    Json(String),
    /// The buffer ran out before all signatures were decoded.
    ShortBuffer,
}

impl fmt::Display for EncdecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncdecError::Unsupported(sig) => {
                write!(f, "Can't encode '{sig}' for endpoint cache")
            }
            EncdecError::Mismatch { sig, got } => {
                write!(f, "value {got} does not match signature '{sig}'")
            }
            EncdecError::Json(msg) => write!(f, "cache codec: {msg}"),
            EncdecError::ShortBuffer => write!(f, "cache buffer exhausted"),
        }
    }
}

impl std::error::Error for EncdecError {}

/// Encode a value list into a single byte buffer.
pub fn encode(vals: &[Value], sigs: &[Sig]) -> Result<Bytes, EncdecError> {
    let mut buf = Vec::new();
    for (val, sig) in vals.iter().zip(sigs) {
        encode_item(&mut buf, val, sig)?;
    }
    Ok(buf.into())
}

fn push_record<T: serde::Serialize>(buf: &mut Vec<u8>, value: &T) -> Result<(), EncdecError> {
    serde_json::to_writer(&mut *buf, value).map_err(|e| EncdecError::Json(e.to_string()))?;
    buf.push(b'\n');
    Ok(())
}

fn mismatch(sig: &Sig, val: &Value) -> EncdecError {
    EncdecError::Mismatch {
        sig: sig.to_string(),
        got: format!("{val:?}"),
    }
}

fn encode_item(buf: &mut Vec<u8>, val: &Value, sig: &Sig) -> Result<(), EncdecError> {
    match sig {
        Sig::Int => match val {
            Value::Int(i) => push_record(buf, i),
            _ => Err(mismatch(sig, val)),
        },
        Sig::Str => match val {
            Value::Str(s) => push_record(buf, s),
            _ => Err(mismatch(sig, val)),
        },
        Sig::Map => match val {
            Value::Map(m) => push_record(buf, m),
            _ => Err(mismatch(sig, val)),
        },
        Sig::Struct(_) => match val {
            Value::Struct { body, .. } => push_record(buf, body),
            Value::Sac(sac) => push_record(buf, &sac.data),
            Value::Fault(fault) => push_record(buf, fault),
            _ => Err(mismatch(sig, val)),
        },
        Sig::Slice(_) => match val {
            Value::Slice { items, .. } => push_record(buf, items),
            _ => Err(mismatch(sig, val)),
        },
        Sig::AnyIface => {
            if matches!(val, Value::Nil) {
                return Err(mismatch(sig, val));
            }
            let dynamic = sig_of(val);
            push_record(buf, &dynamic.to_string())?;
            encode_item(buf, val, &dynamic)
        }
        other => Err(EncdecError::Unsupported(other.to_string())),
    }
}

type Stream<'a> = serde_json::StreamDeserializer<'a, serde_json::de::SliceRead<'a>, Json>;

/// Decode a byte buffer back into values, one per signature.
///
/// Named structs come back as objects (the concrete type is not recovered);
/// the output writer treats them identically.
pub fn decode(data: &[u8], sigs: &[Sig]) -> Result<Vec<Value>, EncdecError> {
    let mut stream = serde_json::Deserializer::from_slice(data).into_iter::<Json>();
    let mut out = Vec::with_capacity(sigs.len());
    for sig in sigs {
        out.push(decode_item(&mut stream, sig)?);
    }
    Ok(out)
}

fn next_record(stream: &mut Stream<'_>) -> Result<Json, EncdecError> {
    stream
        .next()
        .ok_or(EncdecError::ShortBuffer)?
        .map_err(|e| EncdecError::Json(e.to_string()))
}

fn decode_item(stream: &mut Stream<'_>, sig: &Sig) -> Result<Value, EncdecError> {
    match sig {
        Sig::Int => {
            let json = next_record(stream)?;
            json.as_i64().map(Value::Int).ok_or_else(|| EncdecError::Mismatch {
                sig: sig.to_string(),
                got: json.to_string(),
            })
        }
        Sig::Str => match next_record(stream)? {
            Json::String(s) => Ok(Value::Str(s)),
            other => Err(EncdecError::Mismatch {
                sig: sig.to_string(),
                got: other.to_string(),
            }),
        },
        Sig::Map => match next_record(stream)? {
            Json::Object(m) => Ok(Value::Map(m)),
            other => Err(EncdecError::Mismatch {
                sig: sig.to_string(),
                got: other.to_string(),
            }),
        },
        Sig::Struct(name) => {
            let body = next_record(stream)?;
            Ok(Value::Struct {
                name: name.clone(),
                body,
            })
        }
        Sig::Slice(elem) => match next_record(stream)? {
            items @ Json::Array(_) => Ok(Value::Slice {
                elem: (**elem).clone(),
                items,
            }),
            other => Err(EncdecError::Mismatch {
                sig: sig.to_string(),
                got: other.to_string(),
            }),
        },
        Sig::AnyIface => {
            let json = next_record(stream)?;
            let Json::String(raw) = json else {
                return Err(EncdecError::Mismatch {
                    sig: sig.to_string(),
                    got: json.to_string(),
                });
            };
            let dynamic: Sig = raw
                .parse()
                .map_err(|_| EncdecError::Unsupported(raw.clone()))?;
            decode_item(stream, &dynamic)
        }
        other => Err(EncdecError::Unsupported(other.to_string())),
    }
}
