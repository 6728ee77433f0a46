//! The dynamic value currency.
//!
//! Handlers produce a list of [`Value`]s; the output writer and the cache
//! codec consume them, keyed by signature. Typed Rust values enter the
//! system through [`IntoValue`] (single payloads), [`PathArg`] (coerced
//! path variables) and [`IntoOutcome`] (whole return shapes).

use crate::fault::Fault;
use crate::sac::Sac;
use crate::signature::Sig;
use serde_json::Map as JsonMap;
use serde_json::Value as Json;
use std::collections::HashMap;

/// A runtime value, as handed between invoker, cache, and writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A nil interface or nil error slot.
    Nil,
    Int(i64),
    Uint(u64),
    Str(String),
    /// A string-keyed map with dynamic values.
    Map(JsonMap<String, Json>),
    /// A named struct, serialized.
    Struct { name: String, body: Json },
    /// A slice with a known element signature.
    Slice { elem: Sig, items: Json },
    /// A pointer to another value.
    Ptr(Box<Value>),
    Sac(Sac),
    Fault(Fault),
    /// A non-nil opaque error.
    Error(String),
}

/// Conversion of a typed payload into a [`Value`], with its static signature.
pub trait IntoValue {
    fn sig() -> Sig;
    fn into_value(self) -> Value;
}

/// A named, serializable API struct. Implemented via [`api_type!`](crate::api_type).
pub trait ApiType: serde::Serialize {
    /// Full name used in signatures, `<module>.<Type>`.
    fn type_name() -> &'static str;
}

impl IntoValue for i64 {
    fn sig() -> Sig {
        Sig::Int
    }
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for u64 {
    fn sig() -> Sig {
        Sig::Uint
    }
    fn into_value(self) -> Value {
        Value::Uint(self)
    }
}

impl IntoValue for String {
    fn sig() -> Sig {
        Sig::Str
    }
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &'static str {
    fn sig() -> Sig {
        Sig::Str
    }
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for JsonMap<String, Json> {
    fn sig() -> Sig {
        Sig::Map
    }
    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl IntoValue for HashMap<String, Json> {
    fn sig() -> Sig {
        Sig::Map
    }
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().collect())
    }
}

impl IntoValue for Sac {
    fn sig() -> Sig {
        Sig::Struct(crate::signature::SAC_NAME.into())
    }
    fn into_value(self) -> Value {
        Value::Sac(self)
    }
}

impl IntoValue for Box<Sac> {
    fn sig() -> Sig {
        Sig::StructPtr(crate::signature::SAC_NAME.into())
    }
    fn into_value(self) -> Value {
        Value::Ptr(Box::new(Value::Sac(*self)))
    }
}

impl IntoValue for Fault {
    fn sig() -> Sig {
        Sig::Struct(crate::signature::FAULT_NAME.into())
    }
    fn into_value(self) -> Value {
        Value::Fault(self)
    }
}

/// A bare error slot: `None` is the nil error.
impl IntoValue for Option<Fault> {
    fn sig() -> Sig {
        Sig::ErrorIface
    }
    fn into_value(self) -> Value {
        match self {
            Some(f) => Value::Fault(f),
            None => Value::Nil,
        }
    }
}

/// Dynamic passthrough: declared as the empty interface.
impl IntoValue for Value {
    fn sig() -> Sig {
        Sig::AnyIface
    }
    fn into_value(self) -> Value {
        self
    }
}

// ── Path variables ──────────────────────────────────────────────────────────

/// An input coercible from a mux variable. Only `int`, `uint`, and `string`
/// are supported; the dispatcher performs the string decode up front.
pub trait PathArg: Sized + Send + 'static {
    fn sig() -> Sig;
    fn from_value(value: Value) -> Self;
}

impl PathArg for i64 {
    fn sig() -> Sig {
        Sig::Int
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::Int(i) => i,
            _ => 0,
        }
    }
}

impl PathArg for u64 {
    fn sig() -> Sig {
        Sig::Uint
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::Uint(u) => u,
            _ => 0,
        }
    }
}

impl PathArg for String {
    fn sig() -> Sig {
        Sig::Str
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::Str(s) => s,
            _ => String::new(),
        }
    }
}

// ── Return shapes ───────────────────────────────────────────────────────────

/// Markers distinguishing the supported handler return shapes.
pub mod outcome {
    /// A single payload.
    pub struct Single;
    /// `(status, payload)`.
    pub struct StatusPair;
    /// `Result<payload, Fault>`, the `(X, error)` shape.
    pub struct Faulted;
}

/// Conversion of a whole handler return into a signature list and value list.
///
/// The marker parameter `M` keeps the three shape families coherent; it is
/// inferred and never written by hand.
pub trait IntoOutcome<M> {
    fn out_sigs() -> Vec<Sig>;
    fn into_values(self) -> Vec<Value>;
}

impl<T: IntoValue> IntoOutcome<outcome::Single> for T {
    fn out_sigs() -> Vec<Sig> {
        vec![T::sig()]
    }
    fn into_values(self) -> Vec<Value> {
        vec![self.into_value()]
    }
}

impl<T: IntoValue> IntoOutcome<outcome::StatusPair> for (i64, T) {
    fn out_sigs() -> Vec<Sig> {
        vec![Sig::Int, T::sig()]
    }
    fn into_values(self) -> Vec<Value> {
        vec![Value::Int(self.0), self.1.into_value()]
    }
}

impl<T: IntoValue> IntoOutcome<outcome::Faulted> for Result<T, Fault> {
    fn out_sigs() -> Vec<Sig> {
        vec![T::sig(), Sig::ErrorIface]
    }
    fn into_values(self) -> Vec<Value> {
        match self {
            Ok(v) => vec![v.into_value(), Value::Nil],
            Err(f) => vec![Value::Nil, Value::Fault(f)],
        }
    }
}

/// Implement [`ApiType`] and [`IntoValue`] (for `T`, `Vec<T>`, and `Box<T>`)
/// for a serializable struct.
///
/// ```ignore
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Order { id: i64 }
/// aqua_core::api_type!(Order => "demo.Order");
/// ```
#[macro_export]
macro_rules! api_type {
    ($ty:ty => $name:expr) => {
        impl $crate::value::ApiType for $ty {
            fn type_name() -> &'static str {
                $name
            }
        }

        impl $crate::value::IntoValue for $ty {
            fn sig() -> $crate::signature::Sig {
                $crate::signature::Sig::Struct($name.into())
            }
            fn into_value(self) -> $crate::value::Value {
                match $crate::serde_json::to_value(&self) {
                    Ok(body) => $crate::value::Value::Struct {
                        name: $name.into(),
                        body,
                    },
                    Err(err) => $crate::value::Value::Error(err.to_string()),
                }
            }
        }

        impl $crate::value::IntoValue for Vec<$ty> {
            fn sig() -> $crate::signature::Sig {
                $crate::signature::Sig::Slice(Box::new($crate::signature::Sig::Struct(
                    $name.into(),
                )))
            }
            fn into_value(self) -> $crate::value::Value {
                match $crate::serde_json::to_value(&self) {
                    Ok(items) => $crate::value::Value::Slice {
                        elem: $crate::signature::Sig::Struct($name.into()),
                        items,
                    },
                    Err(err) => $crate::value::Value::Error(err.to_string()),
                }
            }
        }

        impl $crate::value::IntoValue for Box<$ty> {
            fn sig() -> $crate::signature::Sig {
                $crate::signature::Sig::StructPtr($name.into())
            }
            fn into_value(self) -> $crate::value::Value {
                $crate::value::Value::Ptr(Box::new(
                    <$ty as $crate::value::IntoValue>::into_value(*self),
                ))
            }
        }
    };
}
