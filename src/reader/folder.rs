//! folder backend (C7): treats a directory on disk as a pseudo-archive
//!
//! Grounded on the teacher's `walkdir::WalkDir` usage in the old compression
//! path (`compress.rs` walked a source directory to decide what to add to an
//! archive); here the same walk produces members directly instead of feeding
//! a writer. Every member's `raw_info` carries its absolute host path;
//! `open_member` hands back a [`crate::io::LazyOpenIO`] over it so walking a
//! large tree doesn't hold one file descriptor per member before anything is
//! actually read.

use crate::error::{ArchiveError, Result};
use crate::io::LazyOpenIO;
use crate::model::{ArchiveInfo, ArchiveMember, MemberType, RawInfo};
use crate::stream::{BoxStream, Stream};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

pub struct FolderBackend {
    root: PathBuf,
}

impl FolderBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl super::Backend for FolderBackend {
    fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format: Some(crate::model::ArchiveFormat::Folder),
            version: None,
            is_solid: false,
            comment: None,
            ..Default::default()
        }
    }

    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let mut out = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchiveError::IOError(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let mut name = relative.to_string_lossy().replace('\\', "/");

            let metadata = entry.metadata().map_err(|e| ArchiveError::IOError(e.into()))?;
            let member_type = if metadata.is_dir() {
                name.push('/');
                MemberType::Dir
            } else if metadata.file_type().is_symlink() {
                MemberType::Symlink
            } else {
                MemberType::File
            };

            let mut member = ArchiveMember::new(name, member_type);
            if member_type == MemberType::File {
                member.file_size = Some(metadata.len());
            }
            member.mtime = metadata.modified().ok();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                member.mode = Some(metadata.permissions().mode());
            }

            if member_type == MemberType::Symlink {
                member.link_target = std::fs::read_link(entry.path())
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned());
            }

            member.raw_info = Some(Arc::new(entry.path().to_path_buf()) as RawInfo);
            out.push(member);
        }

        Ok(out)
    }

    fn open_member(&mut self, member: &ArchiveMember, _pwd: Option<&str>) -> Result<BoxStream> {
        if !matches!(member.member_type, MemberType::File | MemberType::Other) {
            return Err(ArchiveError::MemberCannotBeOpenedError(
                member.filename.clone(),
                "not a regular file".to_string(),
            ));
        }
        let path = member
            .raw_info
            .as_ref()
            .and_then(|info| info.downcast_ref::<PathBuf>())
            .cloned()
            .ok_or_else(|| ArchiveError::MemberNotFoundError(member.filename.clone()))?;
        // the walk already recorded file_size; opening the fd is deferred
        // until the caller actually reads, not forced just to list members
        Ok(Box::new(FileStream {
            io: LazyOpenIO::new(path),
            size: member.file_size,
        }))
    }
}

struct FileStream {
    io: LazyOpenIO,
    size: Option<u64>,
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.io.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.io.seek(pos)
    }
}

impl Stream for FileStream {
    fn seekable(&self) -> bool {
        true
    }

    fn size_hint(&self) -> Option<u64> {
        self.size
    }
}
