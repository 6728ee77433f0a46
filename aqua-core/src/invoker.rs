//! Handler invocation.
//!
//! A [`MethodInvoker`] wraps a service method: the owning service name, the
//! method name, and the cached input/output signatures. Typed async closures
//! are adapted through [`IntoHandler`]; the raw `(writer, request)` shape
//! comes in through [`raw_handler`].

use crate::aide::Aide;
use crate::http::{Request, Response};
use crate::signature::Sig;
use crate::value::{IntoOutcome, PathArg, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ValueFuture = Pin<Box<dyn Future<Output = Vec<Value>> + Send>>;
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased typed handler: pre-coerced argument values in, raw result
/// values out.
pub type TypedFn = dyn Fn(Vec<Value>, Option<Aide>) -> ValueFuture + Send + Sync;
/// A type-erased standard handler working directly on the request.
pub type RawFn = dyn Fn(Request) -> ResponseFuture + Send + Sync;

#[derive(Clone)]
pub enum HandlerKind {
    Typed(Arc<TypedFn>),
    Raw(Arc<RawFn>),
    /// No method behind the declaration (stub-only endpoints).
    None,
}

impl std::fmt::Debug for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKind::Typed(_) => write!(f, "Typed"),
            HandlerKind::Raw(_) => write!(f, "Raw"),
            HandlerKind::None => write!(f, "None"),
        }
    }
}

/// A handler together with its declared signatures.
#[derive(Clone, Debug)]
pub struct Handler {
    pub inp_sigs: Vec<Sig>,
    pub out_sigs: Vec<Sig>,
    pub kind: HandlerKind,
}

impl Handler {
    /// Assemble a handler from explicit parts. Intended for adapters that
    /// build signatures themselves; the endpoint compiler still runs the
    /// full validation battery over the result.
    pub fn from_parts(inp_sigs: Vec<Sig>, out_sigs: Vec<Sig>, kind: HandlerKind) -> Handler {
        Handler {
            inp_sigs,
            out_sigs,
            kind,
        }
    }
}

/// Wraps a `(service, method)` pair with cached signatures.
#[derive(Clone, Debug)]
pub struct MethodInvoker {
    pub owner: String,
    pub name: String,
    pub exists: bool,
    pub inp_sigs: Vec<Sig>,
    pub out_sigs: Vec<Sig>,
    pub(crate) kind: HandlerKind,
}

impl MethodInvoker {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, handler: Handler) -> MethodInvoker {
        MethodInvoker {
            owner: owner.into(),
            name: name.into(),
            exists: true,
            inp_sigs: handler.inp_sigs,
            out_sigs: handler.out_sigs,
            kind: handler.kind,
        }
    }

    /// An invoker for a declared field with no method behind it.
    pub fn missing(owner: impl Into<String>, name: impl Into<String>) -> MethodInvoker {
        MethodInvoker {
            owner: owner.into(),
            name: name.into(),
            exists: false,
            inp_sigs: Vec::new(),
            out_sigs: Vec::new(),
            kind: HandlerKind::None,
        }
    }

    /// Fully qualified `Owner.Method` name for diagnostics.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    pub fn inp_count(&self) -> usize {
        self.inp_sigs.len()
    }

    pub fn out_count(&self) -> usize {
        self.out_sigs.len()
    }

    /// Call the typed method with pre-coerced argument values.
    pub async fn invoke(&self, args: Vec<Value>, aide: Option<Aide>) -> Vec<Value> {
        match &self.kind {
            HandlerKind::Typed(func) => func.as_ref()(args, aide).await,
            _ => Vec::new(),
        }
    }

    pub(crate) fn raw_fn(&self) -> Option<Arc<RawFn>> {
        match &self.kind {
            HandlerKind::Raw(func) => Some(func.clone()),
            _ => None,
        }
    }
}

/// Adapt a typed async closure into a [`Handler`].
///
/// Implemented for closures of 0–4 [`PathArg`] parameters, optionally
/// followed by a trailing [`Aide`], returning any [`IntoOutcome`] shape.
/// The marker `T` is inferred.
pub trait IntoHandler<T> {
    fn into_handler(self) -> Handler;
}

/// Adapt a typed async closure into a [`Handler`].
pub fn handler<F, T>(func: F) -> Handler
where
    F: IntoHandler<T>,
{
    func.into_handler()
}

/// Adapt a raw request handler (the standard-handler shape).
pub fn raw_handler<F, Fut>(func: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Handler {
        inp_sigs: Sig::std_handler_inputs().to_vec(),
        out_sigs: Vec::new(),
        kind: HandlerKind::Raw(Arc::new(move |req| Box::pin(func(req)))),
    }
}

fn next_arg(args: &mut Vec<Value>) -> Value {
    if args.is_empty() {
        Value::Nil
    } else {
        args.remove(0)
    }
}

macro_rules! impl_into_handler {
    ( $( $A:ident $a:ident ),* ) => {
        impl<F, Fut, O, M, $($A,)*> IntoHandler<((), M, $($A,)*)> for F
        where
            F: Fn($($A,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = O> + Send + 'static,
            O: IntoOutcome<M> + Send + 'static,
            $( $A: PathArg, )*
        {
            fn into_handler(self) -> Handler {
                let inp_sigs = vec![$( <$A as PathArg>::sig(), )*];
                let out_sigs = <O as IntoOutcome<M>>::out_sigs();
                let func: Arc<TypedFn> = Arc::new(move |mut args, _aide| {
                    let _ = &mut args;
                    $( let $a = <$A as PathArg>::from_value(next_arg(&mut args)); )*
                    let fut = (self)($($a,)*);
                    Box::pin(async move { fut.await.into_values() })
                });
                Handler {
                    inp_sigs,
                    out_sigs,
                    kind: HandlerKind::Typed(func),
                }
            }
        }

        impl<F, Fut, O, M, $($A,)*> IntoHandler<(Aide, M, $($A,)*)> for F
        where
            F: Fn($($A,)* Aide) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = O> + Send + 'static,
            O: IntoOutcome<M> + Send + 'static,
            $( $A: PathArg, )*
        {
            fn into_handler(self) -> Handler {
                let mut inp_sigs = vec![$( <$A as PathArg>::sig(), )*];
                inp_sigs.push(Sig::aide());
                let out_sigs = <O as IntoOutcome<M>>::out_sigs();
                let func: Arc<TypedFn> = Arc::new(move |mut args, aide: Option<Aide>| {
                    let _ = &mut args;
                    $( let $a = <$A as PathArg>::from_value(next_arg(&mut args)); )*
                    let aide = aide.unwrap_or_else(Aide::detached);
                    let fut = (self)($($a,)* aide);
                    Box::pin(async move { fut.await.into_values() })
                });
                Handler {
                    inp_sigs,
                    out_sigs,
                    kind: HandlerKind::Typed(func),
                }
            }
        }
    };
}

impl_into_handler!();
impl_into_handler!(A1 a1);
impl_into_handler!(A1 a1, A2 a2);
impl_into_handler!(A1 a1, A2 a2, A3 a3);
impl_into_handler!(A1 a1, A2 a2, A3 a3, A4 a4);
