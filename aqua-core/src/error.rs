//! Registration-time errors. All of them abort server startup.

use std::fmt;

/// An invalid service shape detected while compiling endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Mux variable count does not match handler inputs.
    InputCountMismatch {
        url: String,
        method_name: String,
        mux_vars: usize,
        inputs: usize,
    },
    /// A handler input is not `int`, `uint`, or `string`.
    BadInputType { method_name: String, observed: String },
    /// The Aide parameter is not in the terminal position.
    AideNotLast { method_name: String },
    /// A handler output shape is not accepted.
    BadOutput { method_name: String, observed: String },
    /// A CRUD handler took inputs or returned the wrong shape.
    BadCrud { method_name: String, reason: String },
    /// A module named in the fixture is not registered.
    ModuleMissing { name: String },
    /// A cache provider named in the fixture is not registered.
    CacheMissing { name: String, url: String },
    /// The fixture ttl does not parse as a duration.
    BadTtl { url: String, ttl: String },
    /// A `{name:regex}` constraint does not compile.
    BadMuxPattern { url: String, pattern: String },
    /// Two endpoints compiled to the same `METHOD:url` key.
    DuplicateRoute { svc_id: String },
    /// The CRUD descriptor is unusable (engine, connection, or model).
    BadStorage { reason: String },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::InputCountMismatch {
                url,
                method_name,
                mux_vars,
                inputs,
            } => write!(
                f,
                "{url} has {mux_vars} inputs, but the func ({method_name}) has {inputs}"
            ),
            SetupError::BadInputType {
                method_name,
                observed,
            } => write!(
                f,
                "Func input params should be 'int', 'uint' or 'string'. Observed: {observed} in {method_name}"
            ),
            SetupError::AideNotLast { method_name } => {
                write!(f, "Aide parameter should be the last one: {method_name}")
            }
            SetupError::BadOutput {
                method_name,
                observed,
            } => write!(f, "Incorrect return type found in: {method_name} - {observed}"),
            SetupError::BadCrud {
                method_name,
                reason,
            } => write!(f, "Crud method {method_name}: {reason}"),
            SetupError::ModuleMissing { name } => write!(f, "Module:{name} not found"),
            SetupError::CacheMissing { name, url } => {
                write!(f, "Cache provider {name} is missing for {url}")
            }
            SetupError::BadTtl { url, ttl } => {
                write!(f, "Cannot parse ttl [{ttl}] for {url}")
            }
            SetupError::BadMuxPattern { url, pattern } => {
                write!(f, "Cannot compile mux pattern [{pattern}] for {url}")
            }
            SetupError::DuplicateRoute { svc_id } => {
                write!(f, "Multiple services found: {svc_id}")
            }
            SetupError::BadStorage { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for SetupError {}
