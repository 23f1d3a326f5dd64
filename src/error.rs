//! archive error taxonomy

use std::path::PathBuf;

/// errors raised while detecting, reading, or extracting an archive
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("unrecognized or malformed archive header: {0}")]
    FormatError(String),

    #[error("archive data failed an integrity check: {0}")]
    CorruptedError(String),

    #[error("password missing or incorrect for encrypted member")]
    EncryptedError,

    #[error("archive input is truncated: {0}")]
    EOFError(String),

    #[error("no member named '{0}' in archive")]
    MemberNotFoundError(String),

    #[error("member '{0}' cannot be opened ({1})")]
    MemberCannotBeOpenedError(String, String),

    #[error("{0}")]
    NotSupportedError(String),

    #[error("stream does not support seeking but the operation requires it")]
    StreamNotSeekableError,

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("'{0}' already exists")]
    FileExistsError(PathBuf),

    #[error("hardlink target for '{0}' was not found among extracted members")]
    LinkTargetNotFoundError(String),

    #[error("optional backend not available: {0}")]
    PackageNotInstalledError(String),

    #[error("operation attempted on a closed archive or stream")]
    ClosedError,
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        ArchiveError::FormatError(msg.into())
    }

    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        ArchiveError::CorruptedError(msg.into())
    }

    pub fn not_supported<S: Into<String>>(msg: S) -> Self {
        ArchiveError::NotSupportedError(msg.into())
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, ArchiveError::EOFError(_))
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, ArchiveError::CorruptedError(_))
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => ArchiveError::IOError(e),
            zip::result::ZipError::InvalidPassword => ArchiveError::EncryptedError,
            zip::result::ZipError::FileNotFound => {
                ArchiveError::MemberNotFoundError(String::new())
            }
            other => ArchiveError::CorruptedError(other.to_string()),
        }
    }
}

impl From<sevenz_rust::Error> for ArchiveError {
    fn from(err: sevenz_rust::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("password") || msg.contains("Password") || msg.contains("MaybeBadPassword")
        {
            ArchiveError::EncryptedError
        } else {
            ArchiveError::CorruptedError(msg)
        }
    }
}
