//! Reader role: sequentially chunks the source stream into blocks.
//!
//! The reader is the only role touching the source stream, so input order is
//! established exactly once, at read time.  Before every read it blocks on
//! the queue's "may accept more data" condition, which is how backpressure
//! throttles the whole pipeline.

use std::io::{ErrorKind, Read};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::debug;

use crate::block::{BlockCell, BlockStatus};
use crate::error::PipelineError;
use crate::queue::{BlockQueue, SpaceWait};
use crate::signal::{CancelToken, ErrorSlot};
use crate::transform::RECORD_PREFIX_LEN;

/// How the reader delimits blocks in the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Read up to the given number of bytes per block. Used by copy and
    /// compress modes.
    Fixed(usize),
    /// Read a `u32` little-endian record length, then exactly that many
    /// bytes. Used by decompress mode to recover the frames the compressor
    /// emitted.
    LengthPrefixed,
}

/// Run the reader loop to completion. Returns the number of source bytes
/// consumed. Failures land in the shared error slot.
pub(crate) fn run_reader<R: Read>(
    source: &mut R,
    policy: ChunkPolicy,
    initial_status: BlockStatus,
    queue: &BlockQueue,
    dispatch: Option<&Sender<Arc<BlockCell>>>,
    errors: &ErrorSlot,
    cancel: &CancelToken,
) -> u64 {
    let mut seq = 0u64;
    let mut bytes_read = 0u64;

    loop {
        if cancel.is_canceled() || errors.is_set() {
            break;
        }
        if queue.wait_for_space() == SpaceWait::Interrupted {
            break;
        }

        let data = match read_chunk(source, policy, seq) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(blocks = seq, bytes = bytes_read, "source exhausted");
                queue.seal();
                break;
            }
            Err(err) => {
                errors.record(err);
                queue.interrupt();
                break;
            }
        };

        bytes_read += data.len() as u64;
        let cell = BlockCell::new(seq, data, initial_status);
        queue.enqueue(Arc::clone(&cell));
        if let Some(tx) = dispatch {
            // Workers hung up only if the pipeline is already unwinding.
            if tx.send(cell).is_err() {
                break;
            }
        }
        seq += 1;
    }

    bytes_read
}

fn read_chunk<R: Read>(
    source: &mut R,
    policy: ChunkPolicy,
    seq: u64,
) -> Result<Option<Vec<u8>>, PipelineError> {
    match policy {
        ChunkPolicy::Fixed(chunk_size) => {
            let mut buf = vec![0u8; chunk_size];
            let n = loop {
                match source.read(&mut buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(PipelineError::Read(e)),
                }
            };
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok(Some(buf))
        }
        ChunkPolicy::LengthPrefixed => {
            let mut header = [0u8; RECORD_PREFIX_LEN];
            match read_full(source, &mut header).map_err(PipelineError::Read)? {
                0 => return Ok(None),
                n if n < RECORD_PREFIX_LEN => {
                    return Err(PipelineError::TruncatedRecord { seq });
                }
                _ => {}
            }
            let len = u32::from_le_bytes(header) as usize;
            let mut payload = vec![0u8; len];
            let got = read_full(source, &mut payload).map_err(PipelineError::Read)?;
            if got < len {
                return Err(PipelineError::TruncatedRecord { seq });
            }
            Ok(Some(payload))
        }
    }
}

/// Fill `buf` as far as the stream allows; a short count means end of stream.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_truncates_final_chunk() {
        let mut source: &[u8] = &[1, 2, 3, 4, 5];
        let first = read_chunk(&mut source, ChunkPolicy::Fixed(4), 0).unwrap();
        assert_eq!(first, Some(vec![1, 2, 3, 4]));
        let second = read_chunk(&mut source, ChunkPolicy::Fixed(4), 1).unwrap();
        assert_eq!(second, Some(vec![5]));
        let third = read_chunk(&mut source, ChunkPolicy::Fixed(4), 2).unwrap();
        assert_eq!(third, None);
    }

    #[test]
    fn length_prefixed_reads_exact_records() {
        let mut record = 3u32.to_le_bytes().to_vec();
        record.extend_from_slice(&[7, 8, 9]);
        record.extend_from_slice(&1u32.to_le_bytes());
        record.push(42);
        let mut source: &[u8] = &record;

        assert_eq!(
            read_chunk(&mut source, ChunkPolicy::LengthPrefixed, 0).unwrap(),
            Some(vec![7, 8, 9])
        );
        assert_eq!(
            read_chunk(&mut source, ChunkPolicy::LengthPrefixed, 1).unwrap(),
            Some(vec![42])
        );
        assert_eq!(
            read_chunk(&mut source, ChunkPolicy::LengthPrefixed, 2).unwrap(),
            None
        );
    }

    #[test]
    fn truncated_header_is_an_error() {
        let mut source: &[u8] = &[1, 2];
        match read_chunk(&mut source, ChunkPolicy::LengthPrefixed, 5) {
            Err(PipelineError::TruncatedRecord { seq: 5 }) => {}
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut record = 10u32.to_le_bytes().to_vec();
        record.extend_from_slice(&[1, 2, 3]);
        let mut source: &[u8] = &record;
        match read_chunk(&mut source, ChunkPolicy::LengthPrefixed, 0) {
            Err(PipelineError::TruncatedRecord { seq: 0 }) => {}
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
    }
}
