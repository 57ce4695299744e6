//! Wire framing.
//!
//! Every frame starts with a fixed 17-byte big-endian header:
//!
//! ```text
//! ┌───────┬─────────┬──────────┬──────┬──────────┬────────────┬────────────┐
//! │ Magic │ Version │ Length   │ Kind │ Compress │ Serializer │ Request ID │
//! │ 1 byte│ 1 byte  │ 4 bytes  │ 1    │ 1        │ 1          │ 8 bytes    │
//! └───────┴─────────┴──────────┴──────┴──────────┴────────────┴────────────┘
//! ```
//!
//! `Length` counts the header and the body, and is written after the body has
//! been serialized and compressed so it matches the bytes on the wire.

use crate::codec::{CompressionKind, SerializerKind};
use crate::error::{Error, Result};

/// Protocol identifier, first byte of every frame
pub const MAGIC: u8 = 0x1d;

/// Version written into outgoing headers
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_LEN: usize = 17;

/// Largest frame a reader accepts by default (100 MiB)
pub const MAX_FRAME_LEN: u32 = 100 * 1024 * 1024;

/// What a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0,
    Response = 1,
    Ping = 2,
    Pong = 3,
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(MessageKind::Request),
            1 => Ok(MessageKind::Response),
            2 => Ok(MessageKind::Ping),
            3 => Ok(MessageKind::Pong),
            other => Err(Error::Protocol(format!("unknown message kind {}", other))),
        }
    }
}

/// Decoded frame header
///
/// The length field is not stored: it is derived from the body when encoding
/// and checked against the bytes read when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub kind: MessageKind,
    pub compression: CompressionKind,
    pub serializer: SerializerKind,
    pub request_id: u64,
}

impl Header {
    /// Header for the current protocol version
    pub fn new(
        kind: MessageKind,
        compression: CompressionKind,
        serializer: SerializerKind,
        request_id: u64,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            compression,
            serializer,
            request_id,
        }
    }

    pub(crate) fn write(&self, frame_len: u32) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = MAGIC;
        buf[1] = self.version;
        buf[2..6].copy_from_slice(&frame_len.to_be_bytes());
        buf[6] = self.kind as u8;
        buf[7] = self.compression as u8;
        buf[8] = self.serializer as u8;
        buf[9..17].copy_from_slice(&self.request_id.to_be_bytes());
        buf
    }

    /// Parse a header, returning it with the frame length it announces
    pub(crate) fn parse(buf: &[u8; HEADER_LEN]) -> Result<(Self, u32)> {
        if buf[0] != MAGIC {
            return Err(Error::Protocol(format!(
                "bad magic number: expected {:#04x}, found {:#04x}",
                MAGIC, buf[0]
            )));
        }

        let frame_len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if (frame_len as usize) < HEADER_LEN {
            return Err(Error::Protocol(format!(
                "frame length {} is shorter than the {} byte header",
                frame_len, HEADER_LEN
            )));
        }

        let mut request_id = [0u8; 8];
        request_id.copy_from_slice(&buf[9..17]);

        let header = Header {
            version: buf[1],
            kind: MessageKind::try_from(buf[6])?,
            compression: CompressionKind::try_from(buf[7])?,
            serializer: SerializerKind::try_from(buf[8])?,
            request_id: u64::from_be_bytes(request_id),
        };
        Ok((header, frame_len))
    }
}

/// One header plus body as exchanged on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(header: Header, body: Vec<u8>) -> Self {
        Self { header, body }
    }

    /// Size of the encoded frame in bytes
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    /// Header bytes for this frame, with the length field filled in
    pub(crate) fn header_bytes(&self) -> Result<[u8; HEADER_LEN]> {
        let frame_len = u32::try_from(self.wire_len()).map_err(|_| {
            Error::Protocol(format!(
                "frame of {} bytes does not fit the length field",
                self.wire_len()
            ))
        })?;
        Ok(self.header.write(frame_len))
    }

    /// Encode the frame into a contiguous buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header_bytes()?;
        let mut buf = Vec::with_capacity(self.wire_len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }

    /// Decode exactly one frame from `buf`
    ///
    /// The buffer must hold the whole frame and nothing after it.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let Some(head) = buf.first_chunk::<HEADER_LEN>() else {
            return Err(Error::Protocol(format!(
                "truncated header: {} of {} bytes",
                buf.len(),
                HEADER_LEN
            )));
        };
        let (header, frame_len) = Header::parse(head)?;

        let frame_len = frame_len as usize;
        if buf.len() < frame_len {
            return Err(Error::Protocol(format!(
                "truncated body: frame announces {} bytes, got {}",
                frame_len,
                buf.len()
            )));
        }
        if buf.len() > frame_len {
            return Err(Error::Protocol(format!(
                "{} trailing bytes after a {} byte frame",
                buf.len() - frame_len,
                frame_len
            )));
        }

        Ok(Self {
            header,
            body: buf[HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: MessageKind, compression: CompressionKind, serializer: SerializerKind) -> Frame {
        Frame::new(
            Header::new(kind, compression, serializer, 0x0102_0304_0506_0708),
            b"opaque body".to_vec(),
        )
    }

    #[test]
    fn layout_is_big_endian() {
        let frame = sample(
            MessageKind::Response,
            CompressionKind::Gzip,
            SerializerKind::Protobuf,
        );
        let bytes = frame.encode().unwrap();

        assert_eq!(bytes.len(), 17 + 11);
        assert_eq!(bytes[0], MAGIC);
        assert_eq!(bytes[1], PROTOCOL_VERSION);
        assert_eq!(&bytes[2..6], &28u32.to_be_bytes());
        assert_eq!(bytes[6], 1);
        assert_eq!(bytes[7], 0);
        assert_eq!(bytes[8], 1);
        assert_eq!(&bytes[9..17], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[17..], b"opaque body");
    }

    #[test]
    fn decode_reverses_encode_for_every_tag() {
        let kinds = [
            MessageKind::Request,
            MessageKind::Response,
            MessageKind::Ping,
            MessageKind::Pong,
        ];
        for kind in kinds {
            for serializer in [SerializerKind::Bincode, SerializerKind::Protobuf] {
                let frame = sample(kind, CompressionKind::Gzip, serializer);
                let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
                assert_eq!(decoded, frame);
            }
        }
    }

    #[test]
    fn empty_body_is_a_bare_header() {
        let frame = Frame::new(
            Header::new(
                MessageKind::Ping,
                CompressionKind::Gzip,
                SerializerKind::Bincode,
                9,
            ),
            Vec::new(),
        );
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn short_buffers_are_protocol_errors() {
        let bytes = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();

        for len in 0..HEADER_LEN {
            assert!(
                matches!(Frame::decode(&bytes[..len]), Err(Error::Protocol(_))),
                "prefix of {} bytes",
                len
            );
        }
    }

    #[test]
    fn twelve_byte_frame_is_rejected() {
        let bytes = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();

        match Frame::decode(&bytes[..12]) {
            Err(Error::Protocol(msg)) => assert!(msg.contains("truncated header")),
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }

    #[test]
    fn bad_magic_is_rejected_first() {
        for first in (0u8..=255).filter(|b| *b != MAGIC) {
            let mut bytes = vec![0u8; HEADER_LEN];
            bytes[0] = first;
            match Frame::decode(&bytes) {
                Err(Error::Protocol(msg)) => assert!(msg.contains("magic")),
                other => panic!("expected a protocol error, got {:?}", other),
            }
        }
    }

    #[test]
    fn truncated_body_is_rejected() {
        let bytes = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();

        match Frame::decode(&bytes[..bytes.len() - 1]) {
            Err(Error::Protocol(msg)) => assert!(msg.contains("truncated body")),
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();
        bytes.push(0);

        assert!(matches!(Frame::decode(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn length_shorter_than_header_is_rejected() {
        let mut bytes = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();
        bytes[2..6].copy_from_slice(&3u32.to_be_bytes());

        assert!(matches!(Frame::decode(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let good = sample(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
        )
        .encode()
        .unwrap();

        for offset in [6, 7, 8] {
            let mut bytes = good.clone();
            bytes[offset] = 0xee;
            assert!(
                matches!(Frame::decode(&bytes), Err(Error::Protocol(_))),
                "tag at offset {}",
                offset
            );
        }
    }
}
