//! Demo services served by `echo-server`

use std::convert::Infallible;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use courier_fabric::registry::Service;
use courier_fabric::Value;

/// Name the echo service is registered under
pub const ECHO: &str = "echo";

/// Name the counter service is registered under
pub const COUNTER: &str = "counter";

/// String helpers plus a method that always fails
pub fn echo_service() -> Service {
    Service::new()
        .method("Echo", |v: Value| Ok::<_, Infallible>(v))
        .method("Upper", |s: String| Ok::<_, Infallible>(s.to_uppercase()))
        .method("Lower", |s: String| Ok::<_, Infallible>(s.to_lowercase()))
        .method("Reverse", |s: String| {
            Ok::<_, Infallible>(s.chars().rev().collect::<String>())
        })
        .method("Concat", |a: String, b: String| {
            Ok::<_, Infallible>(format!("{}{}", a, b))
        })
        .method("Fail", |reason: String| Err::<(), _>(reason))
}

/// Shared counter; every connection sees the same value
pub fn counter_service() -> Service {
    let count = Arc::new(AtomicI64::new(0));
    let add = count.clone();
    Service::new()
        .method("Add", move |by: i64| {
            Ok::<_, Infallible>(add.fetch_add(by, Ordering::SeqCst) + by)
        })
        .method("Get", move || Ok::<_, Infallible>(count.load(Ordering::SeqCst)))
}

/// Parse a command line argument into a value
///
/// Integers, floats and `true`/`false`/`null` keep their type; anything else
/// is sent as a string.
pub fn parse_arg(arg: &str) -> Value {
    if let Ok(i) = arg.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = arg.parse::<f64>() {
        return Value::Float(f);
    }
    match arg {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}
