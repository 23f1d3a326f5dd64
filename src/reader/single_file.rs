//! single-file-compressed backend (C6): exposes exactly one member for a bare
//! compressor stream with no container (`.gz`, `.bz2`, `.xz`, `.zst`, `.lz4`,
//! `.br`, `.Z`) that the detector didn't upgrade to a TAR variant.
//!
//! When `ArchiveyConfig::use_single_file_stored_metadata` is set (the
//! default) and the stream is gzip, the embedded `FNAME`/`MTIME` header
//! fields and the trailing `CRC32`/`ISIZE` fields are read directly —
//! `flate2::read::GzDecoder::header()` surfaces the header fields once the
//! first byte has been decoded, and the trailer sits in the last 8 bytes of
//! the file regardless of gzip member count.

use crate::config;
use crate::error::Result;
use crate::model::{ArchiveFormat, ArchiveInfo, ArchiveMember, MemberType, StreamFormat};
use crate::stream::{self, BoxStream, SharedSource};
use flate2::read::GzDecoder;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime};

pub struct SingleFileBackend {
    source: SharedSource,
    stream_format: StreamFormat,
    archive_format: ArchiveFormat,
    outer_name: String,
}

impl SingleFileBackend {
    pub fn new(
        source: SharedSource,
        stream_format: StreamFormat,
        archive_format: ArchiveFormat,
        outer_name: String,
    ) -> Self {
        Self {
            source,
            stream_format,
            archive_format,
            outer_name,
        }
    }
}

impl super::Backend for SingleFileBackend {
    fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format: Some(self.archive_format),
            version: None,
            is_solid: false,
            comment: None,
            ..Default::default()
        }
    }

    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let mut filename = strip_compression_extension(&self.outer_name, self.stream_format);
        let mut member = ArchiveMember::new(filename.clone(), MemberType::File);

        let ambient = config::current_config();
        if ambient.use_single_file_stored_metadata && self.stream_format == StreamFormat::Gzip {
            if let Some(stored_name) = read_gzip_stored_name(&self.source) {
                filename = stored_name;
                member.filename = filename;
            }
            member.mtime = read_gzip_mtime(&self.source);
            if let Some((crc32, isize)) = read_gzip_trailer(&self.source) {
                member.crc32 = Some(crc32);
                member.file_size = Some(isize as u64);
            }
            if let Some(extra) = read_gzip_extra_field(&self.source) {
                if !extra.is_empty() {
                    member
                        .extra
                        .insert("gzip.extra_field".to_string(), crate::utils::hex_encode(&extra));
                }
            }
        }

        Ok(vec![member])
    }

    fn open_member(&mut self, _member: &ArchiveMember, _pwd: Option<&str>) -> Result<BoxStream> {
        self.source.rewind_to(0)?;
        stream::open(self.stream_format, self.source.clone())
    }
}

fn strip_compression_extension(name: &str, format: StreamFormat) -> String {
    let suffixes: &[&str] = match format {
        StreamFormat::Gzip => &[".gz", ".z"],
        StreamFormat::Bzip2 => &[".bz2", ".bz"],
        StreamFormat::Xz => &[".xz"],
        StreamFormat::Zstd => &[".zst"],
        StreamFormat::Lz4 => &[".lz4"],
        StreamFormat::Brotli => &[".br"],
        StreamFormat::Zlib => &[".zz"],
        StreamFormat::UnixCompress => &[".z"],
    };
    let lower = name.to_ascii_lowercase();
    for suffix in suffixes {
        if lower.ends_with(suffix) {
            return name[..name.len() - suffix.len()].to_string();
        }
    }
    name.to_string()
}

fn read_gzip_stored_name(source: &SharedSource) -> Option<String> {
    source.rewind_to(0).ok()?;
    let mut decoder = GzDecoder::new(source.clone());
    let mut probe = [0u8; 1];
    let _ = decoder.read(&mut probe);
    let name = decoder.header()?.filename()?;
    Some(String::from_utf8_lossy(name).into_owned())
}

fn read_gzip_mtime(source: &SharedSource) -> Option<SystemTime> {
    source.rewind_to(0).ok()?;
    let mut decoder = GzDecoder::new(source.clone());
    let mut probe = [0u8; 1];
    let _ = decoder.read(&mut probe);
    let mtime = decoder.header()?.mtime();
    if mtime == 0 {
        None
    } else {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime as u64))
    }
}

fn read_gzip_extra_field(source: &SharedSource) -> Option<Vec<u8>> {
    source.rewind_to(0).ok()?;
    let mut decoder = GzDecoder::new(source.clone());
    let mut probe = [0u8; 1];
    let _ = decoder.read(&mut probe);
    decoder.header()?.extra().map(|bytes| bytes.to_vec())
}

fn read_gzip_trailer(source: &SharedSource) -> Option<(u32, u32)> {
    let mut s = source.clone();
    let end = s.seek(SeekFrom::End(0)).ok()?;
    if end < 8 {
        return None;
    }
    s.seek(SeekFrom::Start(end - 8)).ok()?;
    let mut buf = [0u8; 8];
    s.read_exact(&mut buf).ok()?;
    let crc = u32::from_le_bytes(buf[0..4].try_into().ok()?);
    let isize = u32::from_le_bytes(buf[4..8].try_into().ok()?);
    Some((crc, isize))
}
