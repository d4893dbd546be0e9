//! Per-block transforms: the opaque `bytes -> bytes` plug-in applied by the
//! worker pool.
//!
//! A transform must be stateless across calls; blocks are transformed in
//! arbitrary order on different threads, so nothing about one block may leak
//! into the next.  The zstd pair below length-prefixes each compressed frame
//! so the decompressing reader can delimit blocks again — record framing
//! internal to this pipeline pair, not an archive format.

use std::io;

/// Byte length of the little-endian record-length prefix emitted by
/// [`ZstdCompress`] and consumed by the length-prefixed chunk policy.
pub const RECORD_PREFIX_LEN: usize = 4;

/// Error produced by a failing block transform.
#[derive(Debug)]
pub struct TransformError {
    source: io::Error,
}

impl TransformError {
    pub fn new(source: io::Error) -> Self {
        TransformError { source }
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<io::Error> for TransformError {
    fn from(source: io::Error) -> Self {
        TransformError { source }
    }
}

/// A stateless per-block data conversion.
///
/// The worker pool calls `apply` once per block, replaces the block's payload
/// with the returned bytes and advances its status to ready-for-writing.
pub trait BlockTransform: Send + Sync {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Compresses each block as an independent zstd frame, prefixed with the
/// frame length as a `u32` little-endian.
pub struct ZstdCompress {
    level: i32,
}

impl ZstdCompress {
    pub fn new(level: i32) -> Self {
        ZstdCompress { level }
    }
}

impl BlockTransform for ZstdCompress {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let frame = zstd::stream::encode_all(input, self.level)?;
        let len = u32::try_from(frame.len()).map_err(|_| {
            TransformError::new(io::Error::other(format!(
                "compressed frame of {} bytes exceeds the record size limit",
                frame.len()
            )))
        })?;
        let mut out = Vec::with_capacity(RECORD_PREFIX_LEN + frame.len());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&frame);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "zstd-compress"
    }
}

/// Decompresses one zstd frame. The record-length prefix was already
/// stripped by the reader's length-prefixed chunking.
pub struct ZstdDecompress;

impl BlockTransform for ZstdDecompress {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(zstd::stream::decode_all(input)?)
    }

    fn name(&self) -> &'static str {
        "zstd-decompress"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_prefixes_frame_length() {
        let data = b"blockpipe blockpipe blockpipe blockpipe";
        let record = ZstdCompress::new(3).apply(data).unwrap();
        let len = u32::from_le_bytes(record[..RECORD_PREFIX_LEN].try_into().unwrap()) as usize;
        assert_eq!(record.len(), RECORD_PREFIX_LEN + len);

        let restored = ZstdDecompress.apply(&record[RECORD_PREFIX_LEN..]).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn decompress_rejects_garbage() {
        assert!(ZstdDecompress.apply(b"definitely not zstd").is_err());
    }

    #[test]
    fn empty_block_survives_the_pair() {
        let record = ZstdCompress::new(1).apply(b"").unwrap();
        let restored = ZstdDecompress.apply(&record[RECORD_PREFIX_LEN..]).unwrap();
        assert!(restored.is_empty());
    }
}
