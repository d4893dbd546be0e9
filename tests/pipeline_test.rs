use blockpipe::{
    BlockTransform, CancelToken, PipelineBuilder, PipelineStatus, ProcessingMode, TransformError,
};
use rand::{thread_rng, Rng, RngCore};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

// ---------- helpers ----------
fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    thread_rng().fill_bytes(&mut buf);
    buf
}

/// XORs every byte and sleeps a random few milliseconds, so worker
/// completions interleave out of read order. XOR is chunk-boundary agnostic,
/// which makes the expected output independent of how the reader split the
/// input.
struct JitterXor;

impl BlockTransform for JitterXor {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        std::thread::sleep(Duration::from_millis(thread_rng().gen_range(0..5)));
        Ok(input.iter().map(|b| b ^ 0xA5).collect())
    }
}

#[test]
fn copy_roundtrip_in_memory() {
    let data = random_bytes(64 * 1024);
    let mut source: &[u8] = &data;
    let mut target = Vec::new();

    let summary = PipelineBuilder::for_mode(ProcessingMode::Copy)
        .chunk_size(4096)
        .run(&mut source, &mut target, &CancelToken::new())
        .expect("copy failed");

    assert_eq!(summary.status, PipelineStatus::Completed);
    assert_eq!(summary.bytes_read, data.len() as u64);
    assert_eq!(summary.bytes_written, data.len() as u64);
    assert_eq!(target, data);
}

#[test]
fn copy_of_empty_source_yields_empty_target() {
    let mut source: &[u8] = &[];
    let mut target = Vec::new();

    let summary = PipelineBuilder::for_mode(ProcessingMode::Copy)
        .run(&mut source, &mut target, &CancelToken::new())
        .expect("empty copy failed");

    assert_eq!(summary.status, PipelineStatus::Completed);
    assert_eq!(summary.blocks_written, 0);
    assert!(target.is_empty());
}

#[test]
fn compress_then_decompress_restores_bytes() {
    let data = random_bytes(10_000);
    let mut source: &[u8] = &data;
    let mut compressed = Vec::new();

    let summary = PipelineBuilder::for_mode(ProcessingMode::Compress { level: 3 })
        .chunk_size(1024)
        .run(&mut source, &mut compressed, &CancelToken::new())
        .expect("compression failed");
    assert_eq!(summary.status, PipelineStatus::Completed);
    assert_eq!(summary.bytes_read, data.len() as u64);

    let mut compressed_source: &[u8] = &compressed;
    let mut restored = Vec::new();
    let summary = PipelineBuilder::for_mode(ProcessingMode::Decompress)
        .run(&mut compressed_source, &mut restored, &CancelToken::new())
        .expect("decompression failed");

    assert_eq!(summary.status, PipelineStatus::Completed);
    assert_eq!(restored, data);
}

#[test]
fn order_preserved_under_jittery_parallel_transforms() {
    let data = random_bytes(32 * 1024);
    let expected: Vec<u8> = data.iter().map(|b| b ^ 0xA5).collect();

    let mut source: &[u8] = &data;
    let mut target = Vec::new();
    let summary = PipelineBuilder::new()
        .transform(Arc::new(JitterXor))
        .chunk_size(256)
        .workers(8)
        .run(&mut source, &mut target, &CancelToken::new())
        .expect("jitter pipeline failed");

    assert_eq!(summary.status, PipelineStatus::Completed);
    assert_eq!(target, expected, "output bytes out of order");
}

#[test]
fn compressed_files_roundtrip_on_disk() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.bin");
    let compressed = dir.path().join("original.bpz");
    let restored = dir.path().join("restored.bin");

    let data = random_bytes(100 * 1024);
    fs::write(&original, &data).unwrap();

    let mut source = fs::File::open(&original).unwrap();
    let mut target = fs::File::create(&compressed).unwrap();
    PipelineBuilder::for_mode(ProcessingMode::Compress { level: 5 })
        .chunk_size(16 * 1024)
        .run(&mut source, &mut target, &CancelToken::new())
        .expect("compression failed");

    let mut source = fs::File::open(&compressed).unwrap();
    let mut target = fs::File::create(&restored).unwrap();
    PipelineBuilder::for_mode(ProcessingMode::Decompress)
        .run(&mut source, &mut target, &CancelToken::new())
        .expect("decompression failed");

    assert_eq!(fs::read(&restored).unwrap(), data);
}

#[test]
fn decompress_of_truncated_input_fails() {
    // A 4-byte header announcing 100 bytes, followed by only 3.
    let mut bad = 100u32.to_le_bytes().to_vec();
    bad.extend_from_slice(&[1, 2, 3]);

    let mut source: &[u8] = &bad;
    let mut target = Vec::new();
    let result = PipelineBuilder::for_mode(ProcessingMode::Decompress).run(
        &mut source,
        &mut target,
        &CancelToken::new(),
    );
    assert!(result.is_err(), "truncated input must not decompress");
}
