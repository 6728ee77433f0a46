//! Type signatures.
//!
//! Every value flowing through the framework is described by a small string
//! grammar shared by endpoint validation, the output writer, and the cache
//! codec:
//!
//! ```text
//! sig := "int" | "uint" | "string" | "map"
//!      | "i:" fullname | "i:." | "i:.error"
//!      | "st:" fullname | "*st:" fullname
//!      | "sl:" elem | "*sl:" elem | "ar:" elem
//! ```
//!
//! `fullname` is `<module>.<TypeName>`. The empty interface is `i:.` and the
//! error interface is `i:.error`. [`Sig`] is the parsed form; [`sig_of`]
//! classifies a runtime [`Value`]. Classification is pure and stable, so no
//! two components can disagree about the shape of a value.

use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Full name of the per-request helper, as seen in input signatures.
pub const AIDE_NAME: &str = "aqua.Aide";
/// Full name of the error envelope.
pub const FAULT_NAME: &str = "aqua.Fault";
/// Full name of the JSON bag.
pub const SAC_NAME: &str = "aqua.Sac";
/// Full name of the CRUD descriptor.
pub const CRUD_NAME: &str = "aqua.Crud";
/// Interface name of a raw response writer (std-handler input 1).
pub const RESPONSE_WRITER_NAME: &str = "http.ResponseWriter";
/// Struct name of a raw request (std-handler input 2).
pub const RAW_REQUEST_NAME: &str = "http.Request";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sig {
    Int,
    Uint,
    Str,
    Map,
    /// A named struct, `st:<module>.<Type>`.
    Struct(String),
    /// Pointer to a named struct, `*st:…`.
    StructPtr(String),
    /// Slice with element signature, `sl:<elem>`.
    Slice(Box<Sig>),
    /// Pointer to a slice, `*sl:<elem>`.
    SlicePtr(Box<Sig>),
    /// Fixed-size array, `ar:<elem>`.
    Array(Box<Sig>),
    /// The empty interface, `i:.`.
    AnyIface,
    /// The error interface, `i:.error`.
    ErrorIface,
    /// Any other named interface, `i:<fullname>`.
    Iface(String),
}

impl Sig {
    /// Signature of the [`Aide`](crate::aide::Aide) input parameter.
    pub fn aide() -> Sig {
        Sig::Struct(AIDE_NAME.into())
    }

    /// Signature of the CRUD descriptor return.
    pub fn crud() -> Sig {
        Sig::Struct(CRUD_NAME.into())
    }

    /// The two input signatures of a standard raw handler.
    pub fn std_handler_inputs() -> [Sig; 2] {
        [
            Sig::Iface(RESPONSE_WRITER_NAME.into()),
            Sig::StructPtr(RAW_REQUEST_NAME.into()),
        ]
    }

    /// True for the shapes an endpoint may return as a payload
    /// (`string`, `map`, `Sac`, `*Sac`, `i:.`, any struct, slice, or
    /// pointer-to-struct).
    pub fn is_acceptable_output(&self) -> bool {
        match self {
            Sig::Str | Sig::Map | Sig::AnyIface => true,
            Sig::Struct(_) | Sig::StructPtr(_) | Sig::Slice(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Sig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sig::Int => write!(f, "int"),
            Sig::Uint => write!(f, "uint"),
            Sig::Str => write!(f, "string"),
            Sig::Map => write!(f, "map"),
            Sig::Struct(name) => write!(f, "st:{name}"),
            Sig::StructPtr(name) => write!(f, "*st:{name}"),
            Sig::Slice(elem) => write!(f, "sl:{elem}"),
            Sig::SlicePtr(elem) => write!(f, "*sl:{elem}"),
            Sig::Array(elem) => write!(f, "ar:{elem}"),
            Sig::AnyIface => write!(f, "i:."),
            Sig::ErrorIface => write!(f, "i:.error"),
            Sig::Iface(name) => write!(f, "i:{name}"),
        }
    }
}

/// Error returned when a signature string does not match the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigParseError(pub String);

impl fmt::Display for SigParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid signature: {}", self.0)
    }
}

impl std::error::Error for SigParseError {}

impl FromStr for Sig {
    type Err = SigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => return Ok(Sig::Int),
            "uint" => return Ok(Sig::Uint),
            "string" => return Ok(Sig::Str),
            "map" => return Ok(Sig::Map),
            "i:." => return Ok(Sig::AnyIface),
            "i:.error" => return Ok(Sig::ErrorIface),
            _ => {}
        }
        if let Some(name) = s.strip_prefix("*st:") {
            return named(name, s).map(Sig::StructPtr);
        }
        if let Some(elem) = s.strip_prefix("*sl:") {
            return elem.parse().map(|e| Sig::SlicePtr(Box::new(e)));
        }
        if let Some(name) = s.strip_prefix("st:") {
            return named(name, s).map(Sig::Struct);
        }
        if let Some(elem) = s.strip_prefix("sl:") {
            return elem.parse().map(|e| Sig::Slice(Box::new(e)));
        }
        if let Some(elem) = s.strip_prefix("ar:") {
            return elem.parse().map(|e| Sig::Array(Box::new(e)));
        }
        if let Some(name) = s.strip_prefix("i:") {
            return named(name, s).map(Sig::Iface);
        }
        Err(SigParseError(s.into()))
    }
}

fn named(name: &str, whole: &str) -> Result<String, SigParseError> {
    if name.is_empty() {
        Err(SigParseError(whole.into()))
    } else {
        Ok(name.into())
    }
}

/// Classify a runtime value.
///
/// Stable: `sig_of(v)` never changes for a given value, and matches the
/// statically derived signature of the Rust type that produced it.
pub fn sig_of(value: &Value) -> Sig {
    match value {
        Value::Nil => Sig::AnyIface,
        Value::Int(_) => Sig::Int,
        Value::Uint(_) => Sig::Uint,
        Value::Str(_) => Sig::Str,
        Value::Map(_) => Sig::Map,
        Value::Struct { name, .. } => Sig::Struct(name.clone()),
        Value::Slice { elem, .. } => Sig::Slice(Box::new(elem.clone())),
        Value::Ptr(inner) => match sig_of(inner) {
            Sig::Struct(name) => Sig::StructPtr(name),
            Sig::Slice(elem) => Sig::SlicePtr(elem),
            other => other,
        },
        Value::Sac(_) => Sig::Struct(SAC_NAME.into()),
        Value::Fault(_) => Sig::Struct(FAULT_NAME.into()),
        Value::Error(_) => Sig::ErrorIface,
    }
}
