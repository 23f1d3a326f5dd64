//! Unix `ar` archive backend (C6) — hand-rolled, since none of the crates
//! already in the dependency stack parse the format and pulling in a
//! dedicated one for 60-byte fixed headers isn't worth it.
//!
//! Covers the common-denominator layout used by GNU and BSD `ar`: the
//! `!<arch>\n` magic, fixed 60-byte member headers, GNU's `//` long-name
//! table with `/<offset>` back-references, and BSD's `#1/<len>` embedded
//! name prefix. No password support and no streaming-only mode — every
//! member's offset is cheap to discover in one forward pass, so random
//! access is always available. Member bytes are read lazily through
//! [`crate::io::BoundedSharedStream`] rather than buffered up front, since ar
//! members are flat, ungapped byte ranges that need no decompression.

use crate::error::{ArchiveError, Result};
use crate::io::BoundedSharedStream;
use crate::model::{ArchiveFormat, ArchiveInfo, ArchiveMember, MemberType, RawInfo};
use crate::stream::{BoxStream, SharedSource};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const AR_MAGIC: &[u8; 8] = b"!<arch>\n";
const HEADER_LEN: u64 = 60;

pub struct ArBackend {
    source: SharedSource,
}

impl ArBackend {
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }
}

impl super::Backend for ArBackend {
    fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format: Some(ArchiveFormat::Ar),
            version: None,
            is_solid: false,
            comment: None,
            ..Default::default()
        }
    }

    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let mut src = self.source.clone();
        src.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 8];
        src.read_exact(&mut magic)?;
        if &magic != AR_MAGIC {
            return Err(ArchiveError::corrupted("not an ar archive (bad magic)"));
        }

        let end = src.seek(SeekFrom::End(0))?;
        let mut long_names: Option<Vec<u8>> = None;
        let mut out = Vec::new();
        let mut pos = 8u64;

        while pos < end {
            src.seek(SeekFrom::Start(pos))?;
            let mut header = [0u8; HEADER_LEN as usize];
            match src.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if &header[58..60] != b"`\n" {
                return Err(ArchiveError::corrupted("malformed ar member header"));
            }

            let raw_name = ascii_field(&header[0..16]);
            let size: u64 = ascii_field(&header[48..58])
                .parse()
                .map_err(|_| ArchiveError::corrupted("malformed ar size field"))?;
            let mtime = ascii_field(&header[16..28])
                .parse::<u64>()
                .ok()
                .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
            let uid = ascii_field(&header[28..34]).parse::<u32>().ok();
            let gid = ascii_field(&header[34..40]).parse::<u32>().ok();
            let mode = u32::from_str_radix(&ascii_field(&header[40..48]), 8).ok();

            let data_offset = pos + HEADER_LEN;
            let padded_size = size + (size % 2);
            pos = data_offset + padded_size;

            if raw_name == "//" {
                src.seek(SeekFrom::Start(data_offset))?;
                let mut buf = vec![0u8; size as usize];
                src.read_exact(&mut buf)?;
                long_names = Some(buf);
                continue;
            }
            if raw_name == "/" || raw_name == "/SYM64/" {
                continue; // GNU symbol lookup table, not a real member
            }

            if let Some(offset_str) = raw_name.strip_prefix('/') {
                if let Ok(offset) = offset_str.parse::<usize>() {
                    let table = long_names
                        .as_ref()
                        .ok_or_else(|| ArchiveError::corrupted("long name reference before table"))?;
                    let name = gnu_long_name_at(table, offset)?;
                    out.push(new_member(name, size, data_offset, mtime, mode, uid, gid));
                    continue;
                }
            }

            if let Some(len_str) = raw_name.strip_prefix("#1/") {
                let len: usize = len_str
                    .trim()
                    .parse()
                    .map_err(|_| ArchiveError::corrupted("malformed BSD long name length"))?;
                src.seek(SeekFrom::Start(data_offset))?;
                let mut namebuf = vec![0u8; len];
                src.read_exact(&mut namebuf)?;
                let name = String::from_utf8_lossy(&namebuf)
                    .trim_end_matches('\0')
                    .to_string();
                let content_offset = data_offset + len as u64;
                let content_size = size.saturating_sub(len as u64);
                out.push(new_member(name, content_size, content_offset, mtime, mode, uid, gid));
                continue;
            }

            let name = raw_name.trim_end_matches('/').to_string();
            out.push(new_member(name, size, data_offset, mtime, mode, uid, gid));
        }

        Ok(out)
    }

    fn open_member(&mut self, member: &ArchiveMember, _pwd: Option<&str>) -> Result<BoxStream> {
        let offset = member
            .raw_info
            .as_ref()
            .and_then(|info| info.downcast_ref::<u64>())
            .copied()
            .ok_or_else(|| ArchiveError::MemberNotFoundError(member.filename.clone()))?;
        let size = member.file_size.unwrap_or(0);
        Ok(Box::new(BoundedSharedStream::new(
            self.source.clone(),
            offset,
            size,
        )))
    }
}

fn new_member(
    name: String,
    size: u64,
    data_offset: u64,
    mtime: Option<SystemTime>,
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
) -> ArchiveMember {
    let mut member = ArchiveMember::new(name, MemberType::File);
    member.file_size = Some(size);
    member.mtime = mtime;
    member.mode = mode;
    member.uid = uid;
    member.gid = gid;
    member.raw_info = Some(Arc::new(data_offset) as RawInfo);
    member
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn gnu_long_name_at(table: &[u8], offset: usize) -> Result<String> {
    let rest = table
        .get(offset..)
        .ok_or_else(|| ArchiveError::corrupted("long name offset out of range"))?;
    let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    Ok(String::from_utf8_lossy(&rest[..end])
        .trim_end_matches('/')
        .to_string())
}
