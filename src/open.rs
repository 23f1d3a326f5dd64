//! the single public entry point: `open_archive` resolves a path, directory,
//! or byte stream to a concrete [`ArchiveReader`] by combining the detector
//! (C2) with the per-format backend factories (C3/C7)
//!
//! Data flow (spec §2): `open(source, config) -> Detector -> Handler factory
//! -> Reader -> iteration/open/extract`.

use crate::config::{self, ArchiveyConfig};
use crate::detect;
use crate::error::{ArchiveError, Result};
use crate::model::ArchiveFormat;
use crate::reader::{ArchiveReader, Backend, BaseReader, StreamingOnlyWrapper};
use crate::registry::{self, BackendInput};
use crate::stream::{ReadSeek, SharedSource};
use std::fs::File;
use std::path::{Path, PathBuf};

/// the three shapes `open_archive` accepts (spec §1): a filesystem path, a
/// directory (treated as a pseudo-archive), and an arbitrary seekable byte
/// stream, optionally carrying a filename hint used for extension-based
/// detection
pub enum ArchiveSource {
    Path(PathBuf),
    Stream(Box<dyn ReadSeek>, Option<String>),
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        ArchiveSource::Path(path)
    }
}

impl From<&Path> for ArchiveSource {
    fn from(path: &Path) -> Self {
        ArchiveSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ArchiveSource {
    fn from(path: &str) -> Self {
        ArchiveSource::Path(PathBuf::from(path))
    }
}

impl From<File> for ArchiveSource {
    fn from(file: File) -> Self {
        ArchiveSource::Stream(Box::new(file), None)
    }
}

/// per-call overrides for [`open_archive`]; any field left at its default
/// falls back to the ambient [`ArchiveyConfig`] (ArchiveSource itself carries
/// no config)
#[derive(Default)]
pub struct OpenOptions {
    pub config: Option<ArchiveyConfig>,
    pub streaming_only: bool,
    pub pwd: Option<String>,
}

impl OpenOptions {
    pub fn streaming_only(mut self, value: bool) -> Self {
        self.streaming_only = value;
        self
    }

    pub fn with_config(mut self, config: ArchiveyConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_password(mut self, pwd: impl Into<String>) -> Self {
        self.pwd = Some(pwd.into());
        self
    }
}

/// detect the format of and open `source`, returning a reader in
/// random-access or streaming-only mode per `opts.streaming_only`
///
/// The ambient configuration (per §4.8) is pushed for the scope of this call
/// so backend constructors that consult `config::current_config()` (single-
/// file stored metadata, 7z eager link reads, …) see `opts.config` if given.
pub fn open_archive(source: impl Into<ArchiveSource>, opts: OpenOptions) -> Result<Box<dyn ArchiveReader>> {
    let config = opts.config.clone().unwrap_or_else(config::current_config);
    let _guard = config::push_default_config(config.clone());

    let reader = match source.into() {
        ArchiveSource::Path(path) => open_path(&path, &config, opts.pwd.as_deref())?,
        ArchiveSource::Stream(stream, hint) => {
            open_stream(SharedSource::new(stream), hint.as_deref(), &config)?
        }
    };

    if opts.streaming_only {
        Ok(Box::new(StreamingOnlyWrapper::new(reader)))
    } else {
        Ok(reader)
    }
}

fn open_path(path: &Path, config: &ArchiveyConfig, pwd: Option<&str>) -> Result<Box<dyn ArchiveReader>> {
    if path.is_dir() {
        return Ok(Box::new(BaseReader::new(Box::new(
            crate::reader::folder::FolderBackend::new(path.to_path_buf()),
        ))));
    }

    let file = File::open(path)?;
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let source = SharedSource::new(Box::new(crate::io::ExceptionTranslatingIO::new(file)));
    let report = detect::detect_archive_format_by_signature(source.clone(), filename.as_deref())?;

    build_reader(report.format, source, filename, Some(path), config, pwd)
}

fn open_stream(
    source: SharedSource,
    filename_hint: Option<&str>,
    config: &ArchiveyConfig,
) -> Result<Box<dyn ArchiveReader>> {
    let report = detect::detect_archive_format_by_signature(source.clone(), filename_hint)?;
    build_reader(
        report.format,
        source,
        filename_hint.map(|s| s.to_string()),
        None,
        config,
        None,
    )
}

fn build_reader(
    format: ArchiveFormat,
    source: SharedSource,
    filename: Option<String>,
    full_path: Option<&Path>,
    config: &ArchiveyConfig,
    pwd: Option<&str>,
) -> Result<Box<dyn ArchiveReader>> {
    if config.use_libarchive {
        return Err(ArchiveError::PackageNotInstalledError(
            "libarchive backend is not available in this build".to_string(),
        ));
    }
    let _ = config.use_rar_stream; // streaming RAR back-end is a future extension; see DESIGN.md
    let _ = config.sevenzip_read_link_targets_eagerly; // resolved eagerly either way; see DESIGN.md

    let backend: Box<dyn Backend> = match format {
        ArchiveFormat::Zip
        | ArchiveFormat::Rar
        | ArchiveFormat::SevenZip
        | ArchiveFormat::Tar
        | ArchiveFormat::Ar
        | ArchiveFormat::Iso => {
            let registry = registry::global();
            let entry = registry
                .archive_formats()
                .find(|e| e.format == format)
                .ok_or_else(|| {
                    ArchiveError::format(format!("{format:?} support is not registered"))
                })?;
            let input = BackendInput {
                source: source.clone(),
                filename: filename.clone(),
                full_path: full_path.map(Path::to_path_buf),
                pwd: pwd.map(str::to_string),
                config: config.clone(),
            };
            (entry.factory)(&input)?
        }
        ArchiveFormat::TarGz => tar_over(source, crate::model::StreamFormat::Gzip),
        ArchiveFormat::TarBz2 => tar_over(source, crate::model::StreamFormat::Bzip2),
        ArchiveFormat::TarXz => tar_over(source, crate::model::StreamFormat::Xz),
        ArchiveFormat::TarZstd => tar_over(source, crate::model::StreamFormat::Zstd),
        ArchiveFormat::TarLz4 => tar_over(source, crate::model::StreamFormat::Lz4),
        ArchiveFormat::Gzip
        | ArchiveFormat::Bzip2
        | ArchiveFormat::Xz
        | ArchiveFormat::Zstd
        | ArchiveFormat::Lz4
        | ArchiveFormat::Brotli
        | ArchiveFormat::CompressZ => {
            let stream_format = single_file_stream_format(format);
            let outer_name = filename.unwrap_or_else(|| "stream".to_string());
            Box::new(crate::reader::single_file::SingleFileBackend::new(
                source,
                stream_format,
                format,
                outer_name,
            ))
        }
        ArchiveFormat::Folder => {
            return Err(ArchiveError::not_supported(
                "FOLDER format requires a directory path, not a byte stream",
            ))
        }
        ArchiveFormat::Unknown => {
            return Err(ArchiveError::format(
                "could not determine archive format from signature or filename",
            ))
        }
    };

    let _ = pwd; // per-member passwords are supplied to `open`/`iter_members_with_io`, not at construction
    Ok(Box::new(BaseReader::new(backend)))
}

fn tar_over(source: SharedSource, stream_format: crate::model::StreamFormat) -> Box<dyn Backend> {
    Box::new(crate::reader::tar::TarBackend::new(source, Some(stream_format)))
}

fn single_file_stream_format(format: ArchiveFormat) -> crate::model::StreamFormat {
    use crate::model::StreamFormat as S;
    match format {
        ArchiveFormat::Gzip => S::Gzip,
        ArchiveFormat::Bzip2 => S::Bzip2,
        ArchiveFormat::Xz => S::Xz,
        ArchiveFormat::Zstd => S::Zstd,
        ArchiveFormat::Lz4 => S::Lz4,
        ArchiveFormat::Brotli => S::Brotli,
        ArchiveFormat::CompressZ => S::UnixCompress,
        _ => unreachable!("only single-file-compressed formats reach here"),
    }
}
