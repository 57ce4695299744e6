//! Schema-based serializer.
//!
//! Envelopes are mirrored by hand-declared protobuf messages. Values use a
//! `oneof` so integers, floats and raw bytes keep their identity on the wire.

use std::collections::BTreeMap;

use courier_core::Value;
use prost::Message;

use crate::codec::{Codec, Envelope};
use crate::error::{Error, Result};

/// Protobuf codec for schema-based serialization
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufCodec;

impl Codec for ProtobufCodec {
    fn encode<T: Envelope>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(value.to_proto().encode_to_vec())
    }

    fn decode<T: Envelope>(&self, bytes: &[u8]) -> Result<T> {
        let proto = T::Proto::decode(bytes).map_err(|e| Error::Codec(e.to_string()))?;
        T::from_proto(proto)
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoRequest {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(string, tag = "2")]
    pub service_name: String,
    #[prost(string, tag = "3")]
    pub method_name: String,
    #[prost(message, repeated, tag = "4")]
    pub args: Vec<ProtoValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoResponse {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(uint32, tag = "2")]
    pub code: u32,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(uint32, tag = "4")]
    pub compression: u32,
    #[prost(uint32, tag = "5")]
    pub serializer: u32,
    #[prost(message, optional, tag = "6")]
    pub data: Option<ProtoValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoValue {
    #[prost(oneof = "proto_value::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub kind: Option<proto_value::Kind>,
}

pub mod proto_value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(bool, tag = "1")]
        NullValue(bool),
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        #[prost(sint64, tag = "3")]
        IntValue(i64),
        #[prost(double, tag = "4")]
        DoubleValue(f64),
        #[prost(string, tag = "5")]
        StringValue(String),
        #[prost(bytes = "vec", tag = "6")]
        BytesValue(Vec<u8>),
        #[prost(message, tag = "7")]
        ListValue(super::ProtoList),
        #[prost(message, tag = "8")]
        MapValue(super::ProtoMap),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoList {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<ProtoValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoMap {
    #[prost(btree_map = "string, message", tag = "1")]
    pub fields: BTreeMap<String, ProtoValue>,
}

impl From<&Value> for ProtoValue {
    fn from(value: &Value) -> Self {
        use proto_value::Kind;

        let kind = match value {
            Value::Null => Kind::NullValue(true),
            Value::Bool(b) => Kind::BoolValue(*b),
            Value::Int(i) => Kind::IntValue(*i),
            Value::Float(f) => Kind::DoubleValue(*f),
            Value::String(s) => Kind::StringValue(s.clone()),
            Value::Bytes(b) => Kind::BytesValue(b.clone()),
            Value::List(items) => Kind::ListValue(ProtoList {
                values: items.iter().map(ProtoValue::from).collect(),
            }),
            Value::Map(fields) => Kind::MapValue(ProtoMap {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), ProtoValue::from(v)))
                    .collect(),
            }),
        };
        ProtoValue { kind: Some(kind) }
    }
}

impl TryFrom<ProtoValue> for Value {
    type Error = Error;

    fn try_from(proto: ProtoValue) -> Result<Self> {
        use proto_value::Kind;

        let kind = proto
            .kind
            .ok_or_else(|| Error::Codec("protobuf value without a kind".to_string()))?;

        Ok(match kind {
            Kind::NullValue(_) => Value::Null,
            Kind::BoolValue(b) => Value::Bool(b),
            Kind::IntValue(i) => Value::Int(i),
            Kind::DoubleValue(f) => Value::Float(f),
            Kind::StringValue(s) => Value::String(s),
            Kind::BytesValue(b) => Value::Bytes(b),
            Kind::ListValue(list) => Value::List(
                list.values
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_>>()?,
            ),
            Kind::MapValue(map) => Value::Map(
                map.fields
                    .into_iter()
                    .map(|(k, v)| Value::try_from(v).map(|v| (k, v)))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}
