use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::MAX_FRAME_LEN;

/// Compression applied to the serialized body
pub trait Compressor: Send + Sync {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Gzip stream compression
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
    max_output: u64,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
            max_output: u64::from(MAX_FRAME_LEN),
        }
    }
}

impl GzipCompressor {
    /// Compression level between 0 (store) and 9 (best)
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Upper bound on the decompressed size
    pub fn with_max_output(mut self, max_output: u64) -> Self {
        self.max_output = max_output;
        self
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
        encoder
            .write_all(bytes)
            .map_err(|e| Error::Codec(format!("gzip compress: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Codec(format!("gzip compress: {}", e)))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        // One byte past the limit tells "exactly at the limit" from "over it"
        GzDecoder::new(bytes)
            .take(self.max_output + 1)
            .read_to_end(&mut out)
            .map_err(|e| Error::Codec(format!("gzip decompress: {}", e)))?;

        if out.len() as u64 > self.max_output {
            return Err(Error::Codec(format!(
                "gzip decompress: output exceeds {} bytes",
                self.max_output
            )));
        }
        Ok(out)
    }
}

/// Compression tag carried in byte 7 of the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionKind {
    #[default]
    Gzip = 0,
}

impl CompressionKind {
    pub fn compress(self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionKind::Gzip => GzipCompressor::default().compress(bytes),
        }
    }

    pub fn decompress(self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionKind::Gzip => GzipCompressor::default().decompress(bytes),
        }
    }
}

impl TryFrom<u8> for CompressionKind {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionKind::Gzip),
            other => Err(Error::Protocol(format!("unknown compression tag {}", other))),
        }
    }
}
