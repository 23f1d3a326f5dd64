//! ISO-9660 backend (C7), grounded on `other_examples/9c9e0014_gaetschwartz-
//! hezi__src-archive-archive_base.rs.rs`'s `ISOArchive`, which wraps the same
//! `cdfs` crate over a `Read + Seek` source and surfaces `cdfs::ISOError`
//! through a dedicated error variant.
//!
//! `cdfs::ISO9660` exposes its tree through `DirectoryEntry::contents()`, a
//! recursive, push-style iterator with no addressable "open by path"
//! primitive — so, like the ZIP/7z/RAR backends, `members()` walks the whole
//! tree once to build full archive-relative paths and `open_member` walks it
//! again to find the matching file and read it fully into memory.

use crate::error::{ArchiveError, Result};
use crate::model::{ArchiveInfo, ArchiveMember, MemberType};
use crate::stream::{BoxStream, SharedSource, Stream};
use cdfs::{DirectoryEntry, ISO9660};
use std::io::{Cursor, Read, Seek, SeekFrom};

pub struct IsoBackend {
    source: SharedSource,
}

impl IsoBackend {
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    fn open_iso(&self) -> Result<ISO9660<SharedSource>> {
        let mut src = self.source.clone();
        src.seek(SeekFrom::Start(0))?;
        ISO9660::new(src).map_err(|e| ArchiveError::corrupted(format!("invalid ISO-9660 image: {e}")))
    }
}

impl super::Backend for IsoBackend {
    fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format: Some(crate::model::ArchiveFormat::Iso),
            version: None,
            is_solid: false,
            comment: None,
            ..Default::default()
        }
    }

    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let iso = self.open_iso()?;
        let mut out = Vec::new();
        walk(iso.root.contents(), "", &mut out)?;
        Ok(out)
    }

    fn open_member(&mut self, member: &ArchiveMember, _pwd: Option<&str>) -> Result<BoxStream> {
        if member.is_dir() {
            return Err(ArchiveError::not_supported(format!(
                "'{}' is a directory, not a stream",
                member.filename
            )));
        }
        let iso = self.open_iso()?;
        let data = find_file(iso.root.contents(), "", &member.filename)?
            .ok_or_else(|| ArchiveError::MemberNotFoundError(member.filename.clone()))?;
        Ok(Box::new(InMemoryMember::new(data)))
    }
}

fn walk<T: cdfs::ISO9660Reader>(
    entries: impl Iterator<Item = std::result::Result<DirectoryEntry<T>, cdfs::ISOError>>,
    prefix: &str,
    out: &mut Vec<ArchiveMember>,
) -> Result<()> {
    for entry in entries {
        let entry =
            entry.map_err(|e| ArchiveError::corrupted(format!("malformed ISO-9660 entry: {e}")))?;
        match entry {
            DirectoryEntry::Directory(dir) => {
                let name = strip_version(&dir.identifier);
                if name == "." || name == ".." {
                    continue;
                }
                let path = join(prefix, &name);
                let mut member = ArchiveMember::new(format!("{path}/"), MemberType::Dir);
                member.file_size = Some(0);
                out.push(member);
                walk(dir.contents(), &path, out)?;
            }
            DirectoryEntry::File(file) => {
                let name = strip_version(&file.identifier);
                let path = join(prefix, &name);
                let mut member = ArchiveMember::new(path, MemberType::File);
                member.file_size = Some(file.size as u64);
                out.push(member);
            }
        }
    }
    Ok(())
}

fn find_file<T: cdfs::ISO9660Reader>(
    entries: impl Iterator<Item = std::result::Result<DirectoryEntry<T>, cdfs::ISOError>>,
    prefix: &str,
    target: &str,
) -> Result<Option<Vec<u8>>> {
    for entry in entries {
        let entry =
            entry.map_err(|e| ArchiveError::corrupted(format!("malformed ISO-9660 entry: {e}")))?;
        match entry {
            DirectoryEntry::Directory(dir) => {
                let name = strip_version(&dir.identifier);
                if name == "." || name == ".." {
                    continue;
                }
                let path = join(prefix, &name);
                if let Some(found) = find_file(dir.contents(), &path, target)? {
                    return Ok(Some(found));
                }
            }
            DirectoryEntry::File(file) => {
                let name = strip_version(&file.identifier);
                let path = join(prefix, &name);
                if path == target {
                    let mut buf = Vec::new();
                    file.read()
                        .read_to_end(&mut buf)
                        .map_err(ArchiveError::IOError)?;
                    return Ok(Some(buf));
                }
            }
        }
    }
    Ok(None)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// ISO-9660 file identifiers carry a `;<version>` suffix (`README.TXT;1`)
/// that has no place in a normalized archive path
fn strip_version(identifier: &str) -> String {
    identifier
        .split(';')
        .next()
        .unwrap_or(identifier)
        .to_string()
}

struct InMemoryMember {
    cursor: Cursor<Vec<u8>>,
    size: u64,
}

impl InMemoryMember {
    fn new(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            cursor: Cursor::new(data),
            size,
        }
    }
}

impl Read for InMemoryMember {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for InMemoryMember {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Stream for InMemoryMember {
    fn seekable(&self) -> bool {
        true
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}
