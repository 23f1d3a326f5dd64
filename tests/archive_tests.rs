//! End-to-end tests driving `open_archive` against real archives built with
//! each format crate's writer-side API (the crates are already dependencies
//! for decoding; writing fixtures here does not make this crate a writer).

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::TempDir;

use archway::{open_archive, ExtractOptions, OpenOptions};

fn write_zip(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("file1.txt", opts).unwrap();
    zip.write_all(b"Hello, zip!").unwrap();
    zip.start_file("dir/nested.txt", opts).unwrap();
    zip.write_all(b"nested contents").unwrap();
    zip.finish().unwrap();
}

fn write_tar(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(file);
    let mut header = tar::Header::new_gnu();
    header.set_size(11);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "hello.txt", &b"hello world"[..])
        .unwrap();

    let mut dir_header = tar::Header::new_gnu();
    dir_header.set_entry_type(tar::EntryType::Directory);
    dir_header.set_size(0);
    dir_header.set_mode(0o755);
    dir_header.set_cksum();
    builder
        .append_data(&mut dir_header, "subdir/", &b""[..])
        .unwrap();

    builder.finish().unwrap();
}

fn write_tar_with_hardlink(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(file);

    let mut target_header = tar::Header::new_gnu();
    target_header.set_size(6);
    target_header.set_mode(0o644);
    target_header.set_cksum();
    builder
        .append_data(&mut target_header, "target.txt", &b"abcdef"[..])
        .unwrap();

    let mut link_header = tar::Header::new_gnu();
    link_header.set_entry_type(tar::EntryType::Link);
    link_header.set_size(0);
    link_header.set_mode(0o644);
    link_header.set_link_name("target.txt").unwrap();
    link_header.set_cksum();
    builder
        .append_link(&mut link_header, "link.txt", "target.txt")
        .unwrap();

    builder.finish().unwrap();
}

fn write_tar_with_traversal(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(file);
    let mut header = tar::Header::new_gnu();
    header.set_size(4);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "../../etc/passwd", &b"evil"[..])
        .unwrap();
    builder.finish().unwrap();
}

fn write_tar_gz(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "a.txt", &b"alpha"[..])
            .unwrap();
        let mut header2 = tar::Header::new_gnu();
        header2.set_size(4);
        header2.set_mode(0o644);
        header2.set_cksum();
        builder
            .append_data(&mut header2, "b.txt", &b"beta"[..])
            .unwrap();
        builder.finish().unwrap();
    }
    encoder.finish().unwrap();
}

fn write_gzip(path: &Path, content: &[u8]) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn zip_random_access_reads_member_contents() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.zip");
    write_zip(&archive_path);

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let members = reader.get_members().unwrap();
    assert_eq!(members.len(), 2);

    let member = reader.get_member("file1.txt".into()).unwrap();
    let mut stream = reader.open(&member, None).unwrap();
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut buf).unwrap();
    assert_eq!(buf, b"Hello, zip!");
}

#[test]
fn zip_get_member_by_id_matches_by_name() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.zip");
    write_zip(&archive_path);

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let by_name = reader.get_member("file1.txt".into()).unwrap();
    let by_id = reader.get_member(by_name.member_id.into()).unwrap();
    assert_eq!(by_name.filename, by_id.filename);
    assert_eq!(by_name.member_id, by_id.member_id);
}

#[test]
fn tar_extractall_writes_files_and_directories() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.tar");
    write_tar(&archive_path);
    let extract_dir = tmp.path().join("out");

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let report = reader.extractall(&extract_dir).unwrap();
    assert!(report.failures.is_empty());

    assert_eq!(
        fs::read_to_string(extract_dir.join("hello.txt")).unwrap(),
        "hello world"
    );
    assert!(extract_dir.join("subdir").is_dir());
}

#[test]
fn tar_gz_streaming_only_reads_every_member() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.tar.gz");
    write_tar_gz(&archive_path);

    let mut reader = open_archive(
        archive_path.as_path(),
        OpenOptions::default().streaming_only(true),
    )
    .unwrap();

    let mut total = 0usize;
    let mut names = Vec::new();
    while let Some((member, stream)) = reader.next_member_io(None).unwrap() {
        names.push(member.filename.clone());
        if let Some(mut s) = stream {
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut s, &mut buf).unwrap();
            total += buf.len();
        }
    }
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(total, "alpha".len() + "beta".len());

    // random access is refused once streaming-only
    assert!(reader.get_members().is_err());
}

#[test]
fn gzip_single_file_exposes_one_member() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("data.txt.gz");
    write_gzip(&archive_path, b"just one file of content");

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let members = reader.get_members().unwrap();
    assert_eq!(members.len(), 1);

    let mut stream = reader.open(&members[0], None).unwrap();
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut buf).unwrap();
    assert_eq!(buf, b"just one file of content");
}

#[test]
fn hardlink_extraction_produces_samefile() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("links.tar");
    write_tar_with_hardlink(&archive_path);
    let extract_dir = tmp.path().join("out");

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let report = reader.extractall(&extract_dir).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    let target_path = extract_dir.join("target.txt");
    let link_path = extract_dir.join("link.txt");
    assert!(target_path.exists());
    assert!(link_path.exists());
    assert_eq!(
        fs::read_to_string(&target_path).unwrap(),
        fs::read_to_string(&link_path).unwrap()
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let a = fs::metadata(&target_path).unwrap();
        let b = fs::metadata(&link_path).unwrap();
        assert_eq!(a.ino(), b.ino());
    }
}

#[test]
fn path_traversal_member_is_rejected_under_default_filter() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("evil.tar");
    write_tar_with_traversal(&archive_path);
    let extract_dir = tmp.path().join("out");

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    let opts = ExtractOptions {
        raise_on_error: true,
        ..Default::default()
    };
    let result = reader.extract(&extract_dir, &opts);
    assert!(result.is_err());
    assert!(!extract_dir.join("../../etc/passwd").exists());

    // nothing should have escaped the destination directory
    let escaped = tmp.path().join("etc").join("passwd");
    assert!(!escaped.exists());
}

#[test]
fn detection_prefers_signature_over_misleading_extension() {
    let tmp = TempDir::new().unwrap();
    // gzip magic bytes, but named like a zip: the detector must still see a
    // compressor signature and, since the decompressed payload is a tar
    // stream, upgrade it to the TAR-layering variant rather than trusting
    // the `.zip` extension.
    let archive_path = tmp.path().join("foo.zip");
    write_tar_gz(&archive_path);

    let report = archway::detect_archive_format(archive_path.as_path()).unwrap();
    assert_eq!(report.format, archway::ArchiveFormat::TarGz);
    assert!(report.conflict);
}

#[test]
fn empty_zip_has_no_members() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("empty.zip");
    let file = fs::File::create(&archive_path).unwrap();
    let zip = zip::ZipWriter::new(file);
    zip.finish().unwrap();

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    assert!(reader.get_members().unwrap().is_empty());
}

#[test]
fn extracting_twice_under_overwrite_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("basic.tar");
    write_tar(&archive_path);
    let extract_dir = tmp.path().join("out");

    let mut reader = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    reader.extractall(&extract_dir).unwrap();
    let first = fs::read(extract_dir.join("hello.txt")).unwrap();

    let mut reader2 = open_archive(archive_path.as_path(), OpenOptions::default()).unwrap();
    reader2.extractall(&extract_dir).unwrap();
    let second = fs::read(extract_dir.join("hello.txt")).unwrap();

    assert_eq!(first, second);
}
