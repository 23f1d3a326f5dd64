//! resolves a path or stream to a format using magic + extension rules,
//! including TAR layering (C2)
//!
//! Grounded on `9c9e0014_gaetschwartz-hezi`'s `ArchiveType::try_from_datasource`
//! read-ahead-then-seek-back probe pattern and its `guess_from_filename`
//! extension fallback.

use crate::error::Result;
use crate::model::{ArchiveFormat, StreamFormat};
use crate::registry::{self, Registry};
use crate::stream::{self, SharedSource};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// outcome of a detection pass, including whether signature and extension
/// disagreed (§8 scenario 1)
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub format: ArchiveFormat,
    pub by_signature: Option<ArchiveFormat>,
    pub by_extension: Option<ArchiveFormat>,
    pub conflict: bool,
}

/// detect the format of a filesystem path: a directory is always `FOLDER`
pub fn detect_archive_format(path: &Path) -> Result<DetectionReport> {
    if path.is_dir() {
        return Ok(DetectionReport {
            format: ArchiveFormat::Folder,
            by_signature: None,
            by_extension: None,
            conflict: false,
        });
    }

    let file = std::fs::File::open(path)?;
    let source = SharedSource::new(Box::new(file));
    let by_extension = extension_format(path);
    detect_with_extension_hint(source, by_extension)
}

/// detect the format directly from a seekable byte source, given an
/// optional filename (or filename-shaped hint) to resolve extension
/// precedence and TAR layering; restores the stream position on return
/// (§8 property 7)
pub fn detect_archive_format_by_signature(
    source: SharedSource,
    filename_hint: Option<&str>,
) -> Result<DetectionReport> {
    let by_extension = filename_hint.and_then(|name| extension_format(Path::new(name)));
    detect_with_extension_hint(source, by_extension)
}

fn detect_with_extension_hint(
    source: SharedSource,
    by_extension: Option<ArchiveFormat>,
) -> Result<DetectionReport> {
    let registry = registry::global();
    let start = source.position()?;

    let by_signature = signature_format(&registry, &source)?;
    source.rewind_to(start)?;

    let (format, conflict) = resolve(&registry, by_signature, by_extension);

    if conflict {
        log::warn!(
            "archive format detection conflict: signature says {:?}, extension says {:?}; using signature",
            by_signature,
            by_extension
        );
    }

    Ok(DetectionReport {
        format,
        by_signature,
        by_extension,
        conflict,
    })
}

/// TAR-layering rule + signature/extension reconciliation (spec §4.2 steps
/// 4-5)
fn resolve(
    registry: &Registry,
    by_signature: Option<ArchiveFormat>,
    by_extension: Option<ArchiveFormat>,
) -> (ArchiveFormat, bool) {
    let _ = registry;
    let signature_upgraded = by_signature.map(|fmt| upgrade_if_tar_layered(fmt, by_extension));

    match (signature_upgraded, by_extension) {
        (Some(sig), Some(ext)) => (sig, sig != ext),
        (Some(sig), None) => (sig, false),
        (None, Some(ext)) => (ext, false),
        (None, None) => (ArchiveFormat::Unknown, false),
    }
}

/// if `detected` is a bare single-file-compressed format but the filename's
/// extension does *not* itself indicate a single-file compressed archive,
/// upgrade to the matching TAR_* variant (a mislabeled `foo.tar.gz` saved
/// as `foo.gz` should still unpack as tar)
fn upgrade_if_tar_layered(
    detected: ArchiveFormat,
    by_extension: Option<ArchiveFormat>,
) -> ArchiveFormat {
    let stream = match detected {
        ArchiveFormat::Gzip => StreamFormat::Gzip,
        ArchiveFormat::Bzip2 => StreamFormat::Bzip2,
        ArchiveFormat::Xz => StreamFormat::Xz,
        ArchiveFormat::Zstd => StreamFormat::Zstd,
        ArchiveFormat::Lz4 => StreamFormat::Lz4,
        _ => return detected,
    };

    let extension_is_single_file = matches!(by_extension, Some(fmt) if fmt.is_single_file_compressed());
    if extension_is_single_file {
        return detected;
    }

    ArchiveFormat::as_tar_variant(stream).unwrap_or(detected)
}

fn extension_format(path: &Path) -> Option<ArchiveFormat> {
    let filename = path.file_name()?.to_str()?.to_lowercase();

    for (suffix, format) in Registry::compound_tar_extensions() {
        if filename.ends_with(&format!(".{suffix}")) {
            return Some(*format);
        }
    }

    let registry = registry::global();
    for entry in registry.archive_formats() {
        for ext in entry.extensions {
            if filename.ends_with(&format!(".{ext}")) {
                return Some(entry.format);
            }
        }
    }

    for entry in registry.stream_formats() {
        for ext in entry.extensions {
            if filename.ends_with(&format!(".{ext}")) {
                return Some(ArchiveFormat::single_file_compressed(entry.format));
            }
        }
    }

    None
}

fn signature_format(registry: &Registry, source: &SharedSource) -> Result<Option<ArchiveFormat>> {
    for entry in registry.archive_formats() {
        if matches_any_signature(source, entry.signatures)? {
            return Ok(Some(entry.format));
        }
    }

    for entry in registry.stream_formats() {
        if !entry.signatures.is_empty() && matches_any_signature(source, entry.signatures)? {
            return Ok(Some(ArchiveFormat::single_file_compressed(entry.format)));
        }
    }

    // extra-detector formats (no reliable magic) are probed last
    for entry in registry.stream_formats() {
        if entry.has_extra_detector && probe_decompresses(entry.format, source)? {
            return Ok(Some(ArchiveFormat::single_file_compressed(entry.format)));
        }
    }

    Ok(None)
}

fn matches_any_signature(
    source: &SharedSource,
    signatures: &[crate::registry::MagicSignature],
) -> Result<bool> {
    for sig in signatures {
        let mut buf = vec![0u8; sig.bytes.len()];
        if read_at(source, sig.offset, &mut buf)? && buf == sig.bytes {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_at(source: &SharedSource, offset: u64, buf: &mut [u8]) -> Result<bool> {
    let mut s = source.clone();
    if s.seek(SeekFrom::Start(offset)).is_err() {
        return Ok(false);
    }
    match s.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Brotli has no distinctive magic; a short probe-decompress is the only
/// reliable signal (resolved Open Question: left heuristic, may misclassify
/// very short or adversarial inputs)
fn probe_decompresses(format: StreamFormat, source: &SharedSource) -> Result<bool> {
    let mut s = source.clone();
    s.seek(SeekFrom::Start(0))?;
    let stream = match stream::open(format, s) {
        Ok(stream) => stream,
        Err(_) => return Ok(false),
    };
    let mut probe = [0u8; 256];
    let mut reader = stream;
    match reader.read(&mut probe) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(data: Vec<u8>) -> SharedSource {
        SharedSource::new(Box::new(Cursor::new(data)))
    }

    #[test]
    fn detects_zip_by_signature() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0];
        let report =
            detect_archive_format_by_signature(source(data.to_vec()), Some("archive.bin"))
                .unwrap();
        assert_eq!(report.format, ArchiveFormat::Zip);
    }

    #[test]
    fn gzip_magic_with_tar_style_name_upgrades_to_tar_gz() {
        let mut data = vec![0x1F, 0x8B, 0x08, 0x00];
        data.extend_from_slice(&[0u8; 10]);
        let report =
            detect_archive_format_by_signature(source(data), Some("backup.tgz")).unwrap();
        assert_eq!(report.format, ArchiveFormat::TarGz);
    }

    #[test]
    fn gzip_magic_with_plain_gz_name_stays_gzip() {
        let mut data = vec![0x1F, 0x8B, 0x08, 0x00];
        data.extend_from_slice(&[0u8; 10]);
        let report =
            detect_archive_format_by_signature(source(data), Some("single.gz")).unwrap();
        assert_eq!(report.format, ArchiveFormat::Gzip);
    }

    #[test]
    fn conflicting_signature_and_extension_prefers_signature_and_flags_conflict() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0];
        let report =
            detect_archive_format_by_signature(source(data.to_vec()), Some("payload.7z"))
                .unwrap();
        assert_eq!(report.format, ArchiveFormat::Zip);
        assert!(report.conflict);
    }

    #[test]
    fn detection_restores_stream_position() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0];
        let src = source(data.to_vec());
        src.rewind_to(3).unwrap();
        let _ = detect_archive_format_by_signature(src.clone(), None).unwrap();
        assert_eq!(src.position().unwrap(), 3);
    }

    #[test]
    fn unknown_bytes_and_name_report_unknown() {
        let report =
            detect_archive_format_by_signature(source(vec![0u8; 16]), Some("mystery.bin"))
                .unwrap();
        assert_eq!(report.format, ArchiveFormat::Unknown);
    }
}
