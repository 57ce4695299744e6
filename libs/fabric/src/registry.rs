//! Service registry.
//!
//! Services are plain collections of typed handlers, keyed by method name.
//! A handler is any `Fn(A1, .., An) -> Result<R, E>` whose arguments implement
//! [`FromValue`], whose result implements [`IntoValue`] and whose error
//! implements `Display`. Argument count is fixed by the handler's signature
//! and checked before the handler runs.
//!
//! ```
//! use std::convert::Infallible;
//! use courier_fabric::registry::{Registry, Service};
//!
//! let echo = Service::new()
//!     .method("Upper", |s: String| Ok::<_, Infallible>(s.to_uppercase()))
//!     .method("Add", |a: i64, b: i64| Ok::<_, Infallible>(a + b));
//!
//! let mut registry = Registry::new();
//! registry.register("echo", echo);
//!
//! let result = registry.dispatch("echo", "Upper", vec!["abc".into()]).unwrap();
//! assert_eq!(result.as_str(), Some("ABC"));
//! ```

use std::collections::HashMap;
use std::fmt;

use courier_core::{FromValue, IntoValue, Value};

use crate::error::DispatchError;

/// A typed function callable with a list of [`Value`] arguments
///
/// `Args` is the tuple of parameter types; it only exists so one closure type
/// can implement the trait for exactly one arity.
pub trait Handler<Args>: Send + Sync + 'static {
    /// Number of arguments the handler takes
    const ARITY: usize;

    /// Convert `args` and run the handler
    ///
    /// `args.len()` must equal [`Self::ARITY`].
    fn invoke(&self, args: Vec<Value>) -> Result<Value, DispatchError>;
}

macro_rules! one {
    ($t:ident) => {
        1
    };
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<F, R, E, $($arg,)*> Handler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Result<R, E> + Send + Sync + 'static,
            R: IntoValue,
            E: fmt::Display,
            $($arg: FromValue,)*
        {
            const ARITY: usize = 0 $(+ one!($arg))*;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, args: Vec<Value>) -> Result<Value, DispatchError> {
                let mut args = args.into_iter().enumerate();
                $(
                    let $arg = match args.next() {
                        Some((index, value)) => <$arg as FromValue>::from_value(value)
                            .map_err(|source| DispatchError::BadArgument { index, source })?,
                        None => {
                            return Err(DispatchError::Handler(
                                "argument list shorter than handler arity".to_string(),
                            ))
                        }
                    };
                )*
                (self)($($arg),*)
                    .map(IntoValue::into_value)
                    .map_err(|e| DispatchError::Handler(e.to_string()))
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);

type BoxedHandler = Box<dyn Fn(Vec<Value>) -> Result<Value, DispatchError> + Send + Sync>;

struct Method {
    arity: usize,
    handler: BoxedHandler,
}

/// A named group of methods
#[derive(Default)]
pub struct Service {
    methods: HashMap<String, Method>,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method; a second method with the same name replaces the first
    pub fn method<Args, H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<Args>,
    {
        let name = name.into();
        let method = Method {
            arity: H::ARITY,
            handler: Box::new(move |args: Vec<Value>| handler.invoke(args)),
        };
        if self.methods.insert(name.clone(), method).is_some() {
            tracing::warn!(method = %name, "method registered twice, keeping the last one");
        }
        self
    }

    pub fn method_names(&self) -> impl Iterator<Item = &String> {
        self.methods.keys()
    }

    /// Declared argument count of a method
    pub fn arity(&self, method: &str) -> Option<usize> {
        self.methods.get(method).map(|m| m.arity)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("methods", &self.methods.keys())
            .finish()
    }
}

/// Service name to [`Service`] mapping consulted at dispatch time
///
/// Populated before the server starts; the server then shares it read-only
/// between connections.
#[derive(Default, Debug)]
pub struct Registry {
    services: HashMap<String, Service>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service; a second service with the same name replaces the first
    pub fn register(&mut self, name: impl Into<String>, service: Service) -> &mut Self {
        let name = name.into();
        tracing::debug!(service = %name, methods = service.methods.len(), "registering service");
        if self.services.insert(name.clone(), service).is_some() {
            tracing::warn!(service = %name, "service registered twice, keeping the last one");
        }
        self
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &String> {
        self.services.keys()
    }

    /// Resolve `service.method`, check the argument count and run the handler
    pub fn dispatch(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| DispatchError::ServiceNotFound(service.to_string()))?;

        let target = entry
            .methods
            .get(method)
            .ok_or_else(|| DispatchError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })?;

        if args.len() != target.arity {
            return Err(DispatchError::ArityMismatch {
                service: service.to_string(),
                method: method.to_string(),
                expected: target.arity,
                actual: args.len(),
            });
        }

        (target.handler)(args)
    }
}
