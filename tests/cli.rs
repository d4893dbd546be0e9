use assert_cmd::Command;
use predicates::prelude::*;
use rand::{thread_rng, RngCore};
use std::fs;
use tempfile::tempdir;

fn blockpipe() -> Command {
    Command::cargo_bin("blockpipe").expect("binary built")
}

#[test]
fn compress_and_decompress_via_cli() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("data.bin");
    let compressed = dir.path().join("data.bpz");
    let restored = dir.path().join("data.out");

    let mut data = vec![0u8; 64 * 1024];
    thread_rng().fill_bytes(&mut data);
    fs::write(&original, &data).unwrap();

    blockpipe()
        .arg("compress")
        .arg(&original)
        .arg("--output")
        .arg(&compressed)
        .arg("--level")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("Done"));

    blockpipe()
        .arg("decompress")
        .arg(&compressed)
        .arg("--output")
        .arg(&restored)
        .assert()
        .success();

    assert_eq!(fs::read(&restored).unwrap(), data);
}

#[test]
fn copy_preserves_bytes() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("in.bin");
    let copied = dir.path().join("out.bin");
    fs::write(&original, b"hello blockpipe").unwrap();

    blockpipe()
        .arg("copy")
        .arg(&original)
        .arg("--output")
        .arg(&copied)
        .assert()
        .success();

    assert_eq!(fs::read(&copied).unwrap(), b"hello blockpipe");
}

#[test]
fn missing_input_is_reported() {
    let dir = tempdir().unwrap();
    blockpipe()
        .arg("copy")
        .arg(dir.path().join("nope.bin"))
        .arg("--output")
        .arg(dir.path().join("out.bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot open"));
}

#[test]
fn rejects_unknown_subcommand() {
    blockpipe().arg("explode").assert().failure();
}
