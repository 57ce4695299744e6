use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Deepest list/map nesting accepted when deserializing a [`Value`]
pub const MAX_DEPTH: usize = 100;

/// Dynamically typed value carried as an RPC argument or result
///
/// Deserialization rejects values nested more than [`MAX_DEPTH`] lists or
/// maps deep instead of recursing without bound.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in conversion errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Conversion out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Conversion into a [`Value`]
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(()),
            other => Err(Error::mismatch("null", &other)),
        }
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::mismatch("bool", &other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::mismatch("string", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

macro_rules! integer_conversions {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| {
                            Error::OutOfRange(format!("{} does not fit in {}", i, stringify!($ty)))
                        }),
                        other => Err(Error::mismatch("int", &other)),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

integer_conversions!(i8, i16, i32, i64, u8, u16, u32);

impl FromValue for u64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => u64::try_from(i)
                .map_err(|_| Error::OutOfRange(format!("{} does not fit in u64", i))),
            other => Err(Error::mismatch("int", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            // Integers widen; callers sending `2` to a float parameter expect it to work
            Value::Int(i) => Ok(i as f64),
            other => Err(Error::mismatch("float", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(Error::mismatch("list", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(fields) => fields
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(Error::mismatch("map", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        BTreeMap::<String, T>::from_value(value).map(|m| m.into_iter().collect())
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

const VARIANTS: &[&str] = &[
    "Null", "Bool", "Int", "Float", "String", "Bytes", "List", "Map",
];

#[derive(Deserialize)]
#[serde(variant_identifier)]
enum Tag {
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

/// Deserializes one value at a known nesting depth
#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom("value nested too deeply"));
        }
        deserializer.deserialize_enum("Value", VARIANTS, ValueVisitor { depth: self.depth })
    }
}

struct ValueVisitor {
    depth: usize,
}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a Value")
    }

    fn visit_enum<A>(self, data: A) -> std::result::Result<Value, A::Error>
    where
        A: EnumAccess<'de>,
    {
        let inner = ValueSeed {
            depth: self.depth + 1,
        };
        let (tag, variant) = data.variant::<Tag>()?;
        Ok(match tag {
            Tag::Null => {
                variant.unit_variant()?;
                Value::Null
            }
            Tag::Bool => Value::Bool(variant.newtype_variant()?),
            Tag::Int => Value::Int(variant.newtype_variant()?),
            Tag::Float => Value::Float(variant.newtype_variant()?),
            Tag::String => Value::String(variant.newtype_variant()?),
            Tag::Bytes => Value::Bytes(variant.newtype_variant()?),
            Tag::List => Value::List(variant.newtype_variant_seed(ListSeed(inner))?),
            Tag::Map => Value::Map(variant.newtype_variant_seed(MapSeed(inner))?),
        })
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Value>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of values")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<Value>, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // The length prefix is attacker controlled
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<BTreeMap<String, Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of values")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<BTreeMap<String, Value>, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.0)?;
            fields.insert(key, value);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bincode bytes of `depth` nested single-item lists around a `Null`
    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(depth * 12 + 4);
        for _ in 0..depth {
            bytes.extend_from_slice(&6u32.to_le_bytes());
            bytes.extend_from_slice(&1u64.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    fn nest(depth: usize) -> Value {
        (0..depth).fold(Value::Null, |inner, _| Value::List(vec![inner]))
    }

    #[test]
    fn every_kind_survives_bincode() {
        let mut fields = BTreeMap::new();
        fields.insert("raw".to_string(), Value::Bytes(vec![0, 255]));
        fields.insert("xs".to_string(), Value::List(vec![Value::Int(-1), Value::Float(0.5)]));
        let value = Value::List(vec![
            Value::Null,
            Value::Bool(false),
            Value::String("s".into()),
            Value::Map(fields),
        ]);

        let bytes = bincode::serialize(&value).unwrap();
        assert_eq!(bincode::deserialize::<Value>(&bytes).unwrap(), value);
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let value = nest(MAX_DEPTH);
        let bytes = bincode::serialize(&value).unwrap();
        assert_eq!(bytes, nested_lists(MAX_DEPTH));
        assert_eq!(bincode::deserialize::<Value>(&bytes).unwrap(), value);
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing() {
        let err = bincode::deserialize::<Value>(&nested_lists(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{}", err);

        let err = bincode::deserialize::<Value>(&nested_lists(200_000)).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{}", err);
    }

    #[test]
    fn deep_maps_are_rejected_too() {
        let value = (0..=MAX_DEPTH).fold(Value::Null, |inner, _| {
            Value::Map(BTreeMap::from([("k".to_string(), inner)]))
        });
        let bytes = bincode::serialize(&value).unwrap();
        assert!(bincode::deserialize::<Value>(&bytes).is_err());
    }

    #[test]
    fn strings_convert_both_ways() {
        let value = "abc".into_value();
        assert_eq!(value, Value::String("abc".into()));
        assert_eq!(String::from_value(value).unwrap(), "abc");
    }

    #[test]
    fn mismatch_names_both_kinds() {
        let err = String::from_value(Value::Int(3)).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "string",
                found: "int"
            }
        );
        assert_eq!(err.to_string(), "type mismatch: expected string, found int");
    }

    #[test]
    fn narrow_integers_check_range() {
        assert_eq!(u8::from_value(Value::Int(255)).unwrap(), 255);
        assert!(matches!(
            u8::from_value(Value::Int(256)),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            u64::from_value(Value::Int(-1)),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn floats_accept_integers() {
        assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
        assert!(i64::from_value(Value::Float(2.0)).is_err());
    }

    #[test]
    fn options_map_null() {
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(Value::Int(7)).unwrap(), Some(7));
        assert_eq!(None::<i32>.into_value(), Value::Null);
    }

    #[test]
    fn nested_collections() {
        let mut map = HashMap::new();
        map.insert("xs".to_string(), vec![1i64, 2, 3]);
        let value = map.clone().into_value();

        let Value::Map(fields) = &value else {
            panic!("expected a map, got {:?}", value);
        };
        assert_eq!(
            fields["xs"],
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );

        let back = HashMap::<String, Vec<i64>>::from_value(value).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn list_conversion_reports_first_bad_item() {
        let value = Value::List(vec![Value::Int(1), Value::Bool(true)]);
        let err = Vec::<i64>::from_value(value).unwrap_err();
        assert!(err.to_string().contains("found bool"));
    }
}
