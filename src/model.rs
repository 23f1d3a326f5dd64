//! core data types: formats, members, archive info

use std::any::Any;
use std::collections::HashMap;
use std::time::SystemTime;

/// closed enumeration of supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    SevenZip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    TarZstd,
    TarLz4,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
    Brotli,
    CompressZ,
    Iso,
    Ar,
    Folder,
    Unknown,
}

impl ArchiveFormat {
    /// the bijection between a bare compressor format and its TAR-layered sibling
    pub fn as_tar_variant(stream: StreamFormat) -> Option<ArchiveFormat> {
        Some(match stream {
            StreamFormat::Gzip => ArchiveFormat::TarGz,
            StreamFormat::Bzip2 => ArchiveFormat::TarBz2,
            StreamFormat::Xz => ArchiveFormat::TarXz,
            StreamFormat::Zstd => ArchiveFormat::TarZstd,
            StreamFormat::Lz4 => ArchiveFormat::TarLz4,
            _ => return None,
        })
    }

    pub fn single_file_compressed(stream: StreamFormat) -> ArchiveFormat {
        match stream {
            StreamFormat::Gzip => ArchiveFormat::Gzip,
            StreamFormat::Bzip2 => ArchiveFormat::Bzip2,
            StreamFormat::Xz => ArchiveFormat::Xz,
            StreamFormat::Zstd => ArchiveFormat::Zstd,
            StreamFormat::Lz4 => ArchiveFormat::Lz4,
            StreamFormat::Brotli => ArchiveFormat::Brotli,
            StreamFormat::Zlib => ArchiveFormat::Unknown, // zlib has no dedicated container format
            StreamFormat::UnixCompress => ArchiveFormat::CompressZ,
        }
    }

    pub fn is_tar_compressed(self) -> bool {
        matches!(
            self,
            ArchiveFormat::TarGz
                | ArchiveFormat::TarBz2
                | ArchiveFormat::TarXz
                | ArchiveFormat::TarZstd
                | ArchiveFormat::TarLz4
        )
    }

    pub fn is_single_file_compressed(self) -> bool {
        matches!(
            self,
            ArchiveFormat::Gzip
                | ArchiveFormat::Bzip2
                | ArchiveFormat::Xz
                | ArchiveFormat::Zstd
                | ArchiveFormat::Lz4
                | ArchiveFormat::Brotli
                | ArchiveFormat::CompressZ
        )
    }

    /// the compressor carrying this tar variant's inner stream
    pub fn tar_stream_format(self) -> Option<StreamFormat> {
        Some(match self {
            ArchiveFormat::TarGz => StreamFormat::Gzip,
            ArchiveFormat::TarBz2 => StreamFormat::Bzip2,
            ArchiveFormat::TarXz => StreamFormat::Xz,
            ArchiveFormat::TarZstd => StreamFormat::Zstd,
            ArchiveFormat::TarLz4 => StreamFormat::Lz4,
            _ => return None,
        })
    }
}

/// compressor-only enumeration, independent of any container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
    Brotli,
    Zlib,
    UnixCompress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    File,
    Dir,
    Symlink,
    Hardlink,
    Other,
}

/// per-archive metadata
#[derive(Debug, Clone, Default)]
pub struct ArchiveInfo {
    pub format: Option<ArchiveFormat>,
    pub version: Option<String>,
    pub is_solid: bool,
    pub comment: Option<String>,
    /// backend-specific attributes that don't fit a typed field above
    pub extra: HashMap<String, String>,
}

/// opaque per-backend handle a reader uses to re-open a member's stream
pub type RawInfo = std::sync::Arc<dyn Any + Send + Sync>;

/// a single entry inside an archive
#[derive(Clone)]
pub struct ArchiveMember {
    pub filename: String,
    pub file_size: Option<u64>,
    pub compress_size: Option<u64>,
    pub mtime: Option<SystemTime>,
    pub member_type: MemberType,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub uname: Option<String>,
    pub gname: Option<String>,
    pub crc32: Option<u32>,
    pub compression_method: Option<String>,
    pub comment: Option<String>,
    pub create_system: Option<u16>,
    pub encrypted: bool,
    pub link_target: Option<String>,
    pub raw_info: Option<RawInfo>,
    pub member_id: u64,
    pub archive_id: u64,
    /// backend-specific attributes that don't fit a typed field above (e.g.
    /// a ZIP extra-field block, a tar device major/minor pair)
    pub extra: HashMap<String, String>,
}

impl ArchiveMember {
    /// a new, not-yet-registered member; `member_id`/`archive_id` are filled
    /// in by the base reader during registration
    pub fn new(filename: String, member_type: MemberType) -> Self {
        Self {
            filename,
            file_size: None,
            compress_size: None,
            mtime: None,
            member_type,
            mode: None,
            uid: None,
            gid: None,
            uname: None,
            gname: None,
            crc32: None,
            compression_method: None,
            comment: None,
            create_system: None,
            encrypted: false,
            link_target: None,
            raw_info: None,
            member_id: 0,
            archive_id: 0,
            extra: HashMap::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.member_type == MemberType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.member_type == MemberType::File
    }

    pub fn is_symlink(&self) -> bool {
        self.member_type == MemberType::Symlink
    }

    pub fn is_hardlink(&self) -> bool {
        self.member_type == MemberType::Hardlink
    }
}

impl std::fmt::Debug for ArchiveMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveMember")
            .field("filename", &self.filename)
            .field("member_type", &self.member_type)
            .field("file_size", &self.file_size)
            .field("member_id", &self.member_id)
            .field("archive_id", &self.archive_id)
            .finish()
    }
}
