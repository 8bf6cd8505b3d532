//! Cache Payload Compression
//!
//! LZ4 block compression for large cached payloads. Values whose serialized
//! form exceeds the configured threshold are compressed before they enter the
//! local tier; retrieval reverses this transparently, so callers never see
//! the compressed form.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Minimum serialized size before a payload is compressed (1 KB)
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Size-thresholded LZ4 codec for local-tier payloads
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    /// Payloads at or below this size are stored raw
    threshold: usize,
    /// LZ4 high-compression level
    level: i32,
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
            level: 4,
        }
    }
}

impl PayloadCodec {
    /// Create a codec with a custom threshold
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Size threshold in bytes
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Encode a serialized payload, compressing it when it exceeds the
    /// threshold. Returns the stored bytes and whether they are compressed.
    pub fn encode(&self, serialized: Vec<u8>) -> Result<(Bytes, bool)> {
        if serialized.len() <= self.threshold {
            return Ok((Bytes::from(serialized), false));
        }

        let compressed = lz4::block::compress(
            &serialized,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed(e.to_string()))?;

        Ok((Bytes::from(compressed), true))
    }

    /// Decode stored bytes back into the serialized payload
    pub fn decode(&self, payload: &Bytes, compressed: bool) -> Result<Vec<u8>> {
        if !compressed {
            return Ok(payload.to_vec());
        }

        lz4::block::decompress(payload, None)
            .map_err(|e| Error::DecompressionFailed(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
