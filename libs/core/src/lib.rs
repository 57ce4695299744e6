//! Courier Core - value model shared by every Courier crate
//!
//! Arguments and results cross the wire as [`Value`]s. Handlers and callers
//! move between `Value` and plain Rust types with [`FromValue`] and
//! [`IntoValue`].
//!
//! # Example
//!
//! ```
//! use courier_core::{FromValue, IntoValue, Value};
//!
//! let value = vec!["a".to_string(), "b".to_string()].into_value();
//! assert_eq!(value, Value::List(vec!["a".into(), "b".into()]));
//!
//! let back = Vec::<String>::from_value(value).unwrap();
//! assert_eq!(back, ["a", "b"]);
//! ```

pub mod error;
pub mod value;

pub use error::{Error, Result};
pub use value::{FromValue, IntoValue, Value};
