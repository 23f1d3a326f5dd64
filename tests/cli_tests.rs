//! CLI integration tests for archway

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn archway_cmd() -> Command {
    Command::cargo_bin("archway").expect("failed to find archway binary")
}

#[test]
fn test_cli_help() {
    archway_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list and extract heterogeneous"))
        .stdout(predicate::str::contains("--extract-to"))
        .stdout(predicate::str::contains("--stream"))
        .stdout(predicate::str::contains("--info"));
}

#[test]
fn test_cli_version() {
    archway_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("archway"));
}

#[test]
fn test_cli_requires_a_file() {
    archway_cmd().assert().failure();
}

#[test]
fn test_cli_info_prints_format_and_exits() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("data.txt.gz");
    {
        let file = fs::File::create(&archive_path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"hello from gzip").unwrap();
        encoder.finish().unwrap();
    }

    archway_cmd()
        .arg("--info")
        .arg(&archive_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("format:"))
        .stdout(predicate::str::contains("Gzip"));
}

#[test]
fn test_cli_extract_to_writes_files() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.tar");
    {
        let file = fs::File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "hello.txt", &b"howdy"[..])
            .unwrap();
        builder.finish().unwrap();
    }
    let extract_dir = tmp.path().join("out");

    archway_cmd()
        .arg("--extract-to")
        .arg(&extract_dir)
        .arg(&archive_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("extracted 1 member"));

    assert_eq!(
        fs::read_to_string(extract_dir.join("hello.txt")).unwrap(),
        "howdy"
    );
}

#[test]
fn test_cli_reports_error_for_missing_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does_not_exist.zip");

    archway_cmd()
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("archway:"));
}
