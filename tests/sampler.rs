#![cfg(unix)]
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use redoscope::pump::{PathLengthSampler, Sample, Sampler};

/// Write a fake sampler script which speaks just enough of the
/// path-length protocol for the client to be exercised end-to-end.
fn fake_sampler(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("redoscope-fakes-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_sampler_01() {
    // Handshake, then one TOTCOUNT answer per request line.
    let script = fake_sampler(
        "answers.sh",
        r#"echo 'feed base64 lines now'
while read line; do echo "TOTCOUNT 42"; done"#,
    );
    let mut sampler = PathLengthSampler::new(script, b"a+".to_vec(), String::new(), 1, None);
    assert_eq!(sampler.sample(b"aaaa").unwrap(), Sample::Cost(42.0));
    assert_eq!(sampler.sample(b"bbbb").unwrap(), Sample::Cost(42.0));
    sampler.close();
}

#[test]
fn test_sampler_02() {
    // A sampler that exits before its handshake cannot be opened.
    let script = fake_sampler("dies.sh", "exit 1");
    let mut sampler = PathLengthSampler::new(script, b"a+".to_vec(), String::new(), 1, None);
    assert!(sampler.sample(b"aaaa").is_err());
}

#[test]
fn test_sampler_03() {
    // Garbage output is a protocol error; the client recovers by
    // re-opening on the next request, so the error repeats rather
    // than wedging.
    let script = fake_sampler(
        "garbage.sh",
        r#"echo 'feed base64 lines now'
while read line; do echo "WAT"; done"#,
    );
    let mut sampler = PathLengthSampler::new(script, b"a+".to_vec(), String::new(), 1, None);
    assert!(sampler.sample(b"aaaa").is_err());
    assert!(sampler.sample(b"aaaa").is_err());
}
