use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod bincode;
pub mod compress;
pub mod protobuf;

pub use self::bincode::BincodeCodec;
pub use self::compress::{CompressionKind, Compressor, GzipCompressor};
pub use self::protobuf::ProtobufCodec;

/// A message body that every serializer can carry
///
/// Serde covers the generic binary codec; the schema-based codec goes through
/// the protobuf mirror type.
pub trait Envelope: Serialize + DeserializeOwned + Sized {
    /// Protobuf message this envelope maps onto
    type Proto: prost::Message + Default;

    fn to_proto(&self) -> Self::Proto;

    fn from_proto(proto: Self::Proto) -> Result<Self>;
}

/// Codec trait for serializing and deserializing envelopes
pub trait Codec: Send + Sync {
    /// Encode an envelope into bytes
    fn encode<T: Envelope>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes into an envelope
    fn decode<T: Envelope>(&self, bytes: &[u8]) -> Result<T>;
}

/// Serializer tag carried in byte 8 of the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SerializerKind {
    /// Generic binary object serialization (bincode)
    #[default]
    Bincode = 0,
    /// Schema-based serialization (protobuf)
    Protobuf = 1,
}

impl SerializerKind {
    pub fn encode<T: Envelope>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializerKind::Bincode => BincodeCodec.encode(value),
            SerializerKind::Protobuf => ProtobufCodec.encode(value),
        }
    }

    pub fn decode<T: Envelope>(self, bytes: &[u8]) -> Result<T> {
        match self {
            SerializerKind::Bincode => BincodeCodec.decode(bytes),
            SerializerKind::Protobuf => ProtobufCodec.decode(bytes),
        }
    }
}

impl TryFrom<u8> for SerializerKind {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SerializerKind::Bincode),
            1 => Ok(SerializerKind::Protobuf),
            other => Err(Error::Protocol(format!("unknown serializer tag {}", other))),
        }
    }
}

/// Body pipeline: `compress(serialize(envelope))`
pub fn seal<T: Envelope>(
    value: &T,
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Result<Vec<u8>> {
    let serialized = serializer.encode(value)?;
    compression.compress(&serialized)
}

/// Inverse of [`seal`]: `deserialize(decompress(body))`
pub fn open<T: Envelope>(
    body: &[u8],
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Result<T> {
    let serialized = compression.decompress(body)?;
    serializer.decode(&serialized)
}
