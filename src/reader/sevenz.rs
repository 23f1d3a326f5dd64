//! 7z backend (C6), grounded on the teacher's `formats/sevenz.rs`, which
//! already drives `sevenz_rust::SevenZReader::open`/`for_each_entries`.
//!
//! `sevenz_rust` only exposes entries through a push-style callback over the
//! whole archive, not an addressable per-entry reader — so, like the ZIP
//! backend, `members()` and `open_member()` each reopen the archive and walk
//! it sequentially (a solid 7z archive usually has to be decoded sequentially
//! from the start anyway). `open_member` stops at the requested entry,
//! decompresses it fully into memory, and returns a `Cursor`.

use crate::error::{ArchiveError, Result};
use crate::model::{ArchiveInfo, ArchiveMember, MemberType};
use crate::stream::{BoxStream, Stream};
use sevenz_rust::{Password, SevenZReader};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

pub struct SevenzBackend {
    path: PathBuf,
}

impl SevenzBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open_reader(&self, pwd: Option<&str>) -> Result<SevenZReader<std::io::BufReader<std::fs::File>>> {
        let password = pwd.map_or(Password::empty(), Password::from);
        SevenZReader::open(&self.path, password).map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("password") || msg.to_lowercase().contains("encrypted")
            {
                ArchiveError::EncryptedError
            } else {
                ArchiveError::corrupted(format!(
                    "failed to open 7z archive {}: {e}",
                    self.path.display()
                ))
            }
        })
    }
}

impl super::Backend for SevenzBackend {
    fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format: Some(crate::model::ArchiveFormat::SevenZip),
            version: None,
            is_solid: true,
            comment: None,
            ..Default::default()
        }
    }

    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let sz = self.open_reader(None)?;
        let mut out = Vec::new();
        for file in &sz.archive().files {
            let member_type = if file.is_directory() {
                MemberType::Dir
            } else {
                MemberType::File
            };
            let mut member = ArchiveMember::new(file.name.clone(), member_type);
            member.file_size = Some(file.size);
            member.crc32 = if file.crc32 != 0 {
                Some(file.crc32)
            } else {
                None
            };
            // per-entry encryption isn't exposed by this crate; a wrong
            // password surfaces as an EncryptedError from open_reader instead
            out.push(member);
        }
        Ok(out)
    }

    fn open_member(&mut self, member: &ArchiveMember, pwd: Option<&str>) -> Result<BoxStream> {
        if member.is_dir() {
            return Err(ArchiveError::not_supported(format!(
                "'{}' is a directory, not a stream",
                member.filename
            )));
        }

        let mut sz = self.open_reader(pwd)?;
        let mut found = None;
        sz.for_each_entries(|entry, reader| {
            if entry.name == member.filename && found.is_none() {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                found = Some(buf);
            }
            Ok(true)
        })
        .map_err(|e| ArchiveError::corrupted(format!("failed to read 7z entry: {e}")))?;

        let buf = found.ok_or_else(|| ArchiveError::MemberNotFoundError(member.filename.clone()))?;
        Ok(Box::new(InMemoryMember::new(buf)))
    }
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
