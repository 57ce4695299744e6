use courier_core::Value;
use serde::{Deserialize, Serialize};

use crate::codec::protobuf::{ProtoRequest, ProtoResponse, ProtoValue};
use crate::codec::{self, CompressionKind, Envelope, SerializerKind};
use crate::error::{Error, Result};
use crate::frame::{Frame, Header, MessageKind};

/// Status code of a successful call
pub const STATUS_OK: u16 = 200;

/// Status code of a failed call
pub const STATUS_ERROR: u16 = 500;

/// Call request carried in a request frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: u64,
    pub service: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(
        request_id: u64,
        service: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            request_id,
            service: service.into(),
            method: method.into(),
            args,
        }
    }
}

/// Call outcome carried in a response frame
///
/// `data` is only present when `code` is [`STATUS_OK`]; `message` is only
/// populated on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub code: u16,
    pub message: String,
    pub compression: CompressionKind,
    pub serializer: SerializerKind,
    pub data: Option<Value>,
}

impl Response {
    pub fn success(
        request_id: u64,
        compression: CompressionKind,
        serializer: SerializerKind,
        data: Value,
    ) -> Self {
        Self {
            request_id,
            code: STATUS_OK,
            message: String::new(),
            compression,
            serializer,
            data: Some(data),
        }
    }

    pub fn failure(
        request_id: u64,
        compression: CompressionKind,
        serializer: SerializerKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            code: STATUS_ERROR,
            message: message.into(),
            compression,
            serializer,
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_OK
    }

    /// The payload of a successful response, or [`Error::Remote`]
    pub fn into_result(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(Error::Remote {
                code: self.code,
                message: self.message,
            })
        }
    }
}

impl Envelope for Request {
    type Proto = ProtoRequest;

    fn to_proto(&self) -> ProtoRequest {
        ProtoRequest {
            request_id: self.request_id,
            service_name: self.service.clone(),
            method_name: self.method.clone(),
            args: self.args.iter().map(ProtoValue::from).collect(),
        }
    }

    fn from_proto(proto: ProtoRequest) -> Result<Self> {
        Ok(Self {
            request_id: proto.request_id,
            service: proto.service_name,
            method: proto.method_name,
            args: proto
                .args
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<_>>()?,
        })
    }
}

impl Envelope for Response {
    type Proto = ProtoResponse;

    fn to_proto(&self) -> ProtoResponse {
        ProtoResponse {
            request_id: self.request_id,
            code: u32::from(self.code),
            message: self.message.clone(),
            compression: self.compression as u32,
            serializer: self.serializer as u32,
            data: self.data.as_ref().map(ProtoValue::from),
        }
    }

    fn from_proto(proto: ProtoResponse) -> Result<Self> {
        let tag = |field: &str, raw: u32| {
            u8::try_from(raw)
                .map_err(|_| Error::Codec(format!("{} tag {} out of range", field, raw)))
        };
        let code = u16::try_from(proto.code)
            .map_err(|_| Error::Codec(format!("status code {} out of range", proto.code)))?;

        Ok(Self {
            request_id: proto.request_id,
            code,
            message: proto.message,
            compression: CompressionKind::try_from(tag("compression", proto.compression)?)?,
            serializer: SerializerKind::try_from(tag("serializer", proto.serializer)?)?,
            data: proto.data.map(Value::try_from).transpose()?,
        })
    }
}

impl Frame {
    /// Request frame with body `compress(serialize(request))`
    pub fn request(
        request: &Request,
        compression: CompressionKind,
        serializer: SerializerKind,
    ) -> Result<Self> {
        let header = Header::new(
            MessageKind::Request,
            compression,
            serializer,
            request.request_id,
        );
        let body = codec::seal(request, compression, serializer)?;
        Ok(Self::new(header, body))
    }

    /// Response frame encoded with the tags recorded in the response
    pub fn response(response: &Response) -> Result<Self> {
        let header = Header::new(
            MessageKind::Response,
            response.compression,
            response.serializer,
            response.request_id,
        );
        let body = codec::seal(response, response.compression, response.serializer)?;
        Ok(Self::new(header, body))
    }

    pub fn ping(request_id: u64) -> Self {
        Self::new(
            Header::new(
                MessageKind::Ping,
                CompressionKind::default(),
                SerializerKind::default(),
                request_id,
            ),
            Vec::new(),
        )
    }

    pub fn pong(request_id: u64) -> Self {
        Self::new(
            Header::new(
                MessageKind::Pong,
                CompressionKind::default(),
                SerializerKind::default(),
                request_id,
            ),
            Vec::new(),
        )
    }

    pub fn decode_request(&self) -> Result<Request> {
        self.expect_kind(MessageKind::Request)?;
        codec::open(&self.body, self.header.compression, self.header.serializer)
    }

    pub fn decode_response(&self) -> Result<Response> {
        self.expect_kind(MessageKind::Response)?;
        codec::open(&self.body, self.header.compression, self.header.serializer)
    }

    fn expect_kind(&self, kind: MessageKind) -> Result<()> {
        if self.header.kind == kind {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "expected a {:?} frame, got {:?}",
                kind, self.header.kind
            )))
        }
    }
}
