//! declarative table of supported archive and stream formats (C1)
//!
//! Generalizes the teacher's `formats::Format` enum (a hardcoded six-way
//! match across `detect`/`from_magic`/`from_extension`/`extension`/`name`)
//! into a data table keyed by [`ArchiveFormat`]/[`StreamFormat`], following
//! `9c9e0014_gaetschwartz-hezi`'s const-generic `MagicBytesAt<const N, const
//! REPR>` signature-table pattern. Callers may extend the table at runtime
//! via [`Registry::register_reader`]/[`Registry::register_stream_handler`] —
//! each entry carries not just detection metadata but the constructor
//! (`factory`/`open`) that `open::build_reader`/`stream::open` dispatch
//! through, so registering a new entry also changes what gets constructed,
//! not only what gets detected.

use crate::config::ArchiveyConfig;
use crate::error::{ArchiveError, Result as ArchResult};
use crate::model::{ArchiveFormat, StreamFormat};
use crate::reader::Backend;
use crate::stream::{BoxStream, SharedSource};
use std::collections::HashMap;
use std::path::PathBuf;

/// everything a format's constructor might need; which fields it actually
/// uses depends on the format (RAR/7z need `full_path`, most need only
/// `source`)
pub struct BackendInput {
    pub source: SharedSource,
    pub filename: Option<String>,
    pub full_path: Option<PathBuf>,
    pub pwd: Option<String>,
    pub config: ArchiveyConfig,
}

impl BackendInput {
    /// RAR and 7z back ends need a real filesystem path — their underlying
    /// crates open the file themselves; only a path-based open provides one
    pub fn require_path(&self) -> ArchResult<PathBuf> {
        self.full_path.clone().ok_or_else(|| {
            ArchiveError::not_supported(
                "this format requires a filesystem path, not an in-memory stream",
            )
        })
    }
}

pub type BackendFactory = fn(&BackendInput) -> ArchResult<Box<dyn Backend>>;
pub type StreamOpenFn = fn(SharedSource) -> ArchResult<BoxStream>;

/// a magic byte sequence expected at a fixed offset from the start of a
/// stream
#[derive(Debug, Clone, Copy)]
pub struct MagicSignature {
    pub offset: u64,
    pub bytes: &'static [u8],
}

impl MagicSignature {
    pub const fn new(offset: u64, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }
}

/// a single registered stream (compressor) format
#[derive(Clone)]
pub struct StreamFormatEntry {
    pub format: StreamFormat,
    pub signatures: &'static [MagicSignature],
    pub extensions: &'static [&'static str],
    /// formats without a distinctive magic (Brotli) are matched last, by
    /// attempting to decode a small probe of the stream
    pub has_extra_detector: bool,
    /// opens a decoder over a rewound source; `stream::open` dispatches
    /// through this rather than matching on `format` itself
    pub open: StreamOpenFn,
}

/// a single registered archive (container) format
#[derive(Clone)]
pub struct ArchiveFormatEntry {
    pub format: ArchiveFormat,
    pub signatures: &'static [MagicSignature],
    pub extensions: &'static [&'static str],
    /// builds the backend for this format; `open::build_reader` dispatches
    /// through this rather than matching on `format` itself
    pub factory: BackendFactory,
}

/// the builtin + runtime-registered format tables
#[derive(Clone)]
pub struct Registry {
    stream_formats: Vec<StreamFormatEntry>,
    archive_formats: Vec<ArchiveFormatEntry>,
    disabled_archive_formats: HashMap<ArchiveFormat, ()>,
}

const GZIP_SIGS: &[MagicSignature] = &[MagicSignature::new(0, &[0x1F, 0x8B])];
const BZIP2_SIGS: &[MagicSignature] = &[MagicSignature::new(0, b"BZh")];
const XZ_SIGS: &[MagicSignature] = &[MagicSignature::new(
    0,
    &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00],
)];
const ZSTD_SIGS: &[MagicSignature] = &[MagicSignature::new(0, &[0x28, 0xB5, 0x2F, 0xFD])];
const LZ4_SIGS: &[MagicSignature] = &[MagicSignature::new(0, &[0x04, 0x22, 0x4D, 0x18])];
const ZLIB_SIGS: &[MagicSignature] = &[
    MagicSignature::new(0, &[0x78, 0x01]),
    MagicSignature::new(0, &[0x78, 0x5E]),
    MagicSignature::new(0, &[0x78, 0x9C]),
    MagicSignature::new(0, &[0x78, 0xDA]),
];
const UNIX_COMPRESS_SIGS: &[MagicSignature] = &[MagicSignature::new(0, &[0x1F, 0x9D])];

const ZIP_SIGS: &[MagicSignature] = &[
    MagicSignature::new(0, &[0x50, 0x4B, 0x03, 0x04]),
    MagicSignature::new(0, &[0x50, 0x4B, 0x05, 0x06]),
    MagicSignature::new(0, &[0x50, 0x4B, 0x07, 0x08]),
];
const RAR_SIGS: &[MagicSignature] = &[
    MagicSignature::new(0, b"Rar!\x1a\x07\x00"),
    MagicSignature::new(0, b"Rar!\x1a\x07\x01\x00"),
];
const SEVENZ_SIGS: &[MagicSignature] =
    &[MagicSignature::new(0, &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C])];
const TAR_SIGS: &[MagicSignature] = &[
    MagicSignature::new(257, b"ustar\x0000"),
    MagicSignature::new(257, b"ustar  \x00"),
];
const AR_SIGS: &[MagicSignature] = &[MagicSignature::new(0, b"!<arch>\n")];
const ISO_SIGS: &[MagicSignature] = &[
    MagicSignature::new(0x8001, b"CD001"),
    MagicSignature::new(0x8801, b"CD001"),
    MagicSignature::new(0x9001, b"CD001"),
];

fn zip_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    Ok(Box::new(crate::reader::zip::ZipBackend::new(
        input.source.clone(),
    )?))
}

#[cfg(feature = "rar")]
fn rar_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    let path = input.require_path()?;
    Ok(Box::new(crate::reader::rar::RarBackend::new(path)))
}

#[cfg(not(feature = "rar"))]
fn rar_factory(_input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    Err(ArchiveError::PackageNotInstalledError(
        "RAR support requires the 'rar' feature".to_string(),
    ))
}

fn sevenzip_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    let path = input.require_path()?;
    Ok(Box::new(crate::reader::sevenz::SevenzBackend::new(path)))
}

fn tar_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    Ok(Box::new(crate::reader::tar::TarBackend::new(
        input.source.clone(),
        None,
    )))
}

fn ar_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    Ok(Box::new(crate::reader::ar::ArBackend::new(
        input.source.clone(),
    )))
}

fn iso_factory(input: &BackendInput) -> ArchResult<Box<dyn Backend>> {
    Ok(Box::new(crate::reader::iso::IsoBackend::new(
        input.source.clone(),
    )))
}

impl Registry {
    /// the builtin table: every format this crate understands out of the box
    pub fn with_builtins() -> Self {
        let stream_formats = vec![
            StreamFormatEntry {
                format: StreamFormat::Gzip,
                signatures: GZIP_SIGS,
                extensions: &["gz", "gzip"],
                has_extra_detector: false,
                open: crate::stream::gzip::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Bzip2,
                signatures: BZIP2_SIGS,
                extensions: &["bz2", "bzip2"],
                has_extra_detector: false,
                open: crate::stream::bzip2::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Xz,
                signatures: XZ_SIGS,
                extensions: &["xz"],
                has_extra_detector: false,
                open: crate::stream::xz::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Zstd,
                signatures: ZSTD_SIGS,
                extensions: &["zst", "zstd"],
                has_extra_detector: false,
                open: crate::stream::zstd::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Lz4,
                signatures: LZ4_SIGS,
                extensions: &["lz4"],
                has_extra_detector: false,
                open: crate::stream::lz4::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Brotli,
                signatures: &[],
                extensions: &["br"],
                has_extra_detector: true,
                open: crate::stream::brotli::open,
            },
            StreamFormatEntry {
                format: StreamFormat::Zlib,
                signatures: ZLIB_SIGS,
                extensions: &["zz", "zlib"],
                has_extra_detector: false,
                open: crate::stream::zlib::open,
            },
            StreamFormatEntry {
                format: StreamFormat::UnixCompress,
                signatures: UNIX_COMPRESS_SIGS,
                extensions: &["z", "Z"],
                has_extra_detector: false,
                open: crate::stream::unix_compress::open,
            },
        ];

        let archive_formats = vec![
            ArchiveFormatEntry {
                format: ArchiveFormat::Zip,
                signatures: ZIP_SIGS,
                extensions: &["zip"],
                factory: zip_factory,
            },
            ArchiveFormatEntry {
                format: ArchiveFormat::Rar,
                signatures: RAR_SIGS,
                extensions: &["rar"],
                factory: rar_factory,
            },
            ArchiveFormatEntry {
                format: ArchiveFormat::SevenZip,
                signatures: SEVENZ_SIGS,
                extensions: &["7z", "7zip"],
                factory: sevenzip_factory,
            },
            ArchiveFormatEntry {
                format: ArchiveFormat::Tar,
                signatures: TAR_SIGS,
                extensions: &["tar"],
                factory: tar_factory,
            },
            ArchiveFormatEntry {
                format: ArchiveFormat::Ar,
                signatures: AR_SIGS,
                extensions: &["a", "ar", "deb"],
                factory: ar_factory,
            },
            ArchiveFormatEntry {
                format: ArchiveFormat::Iso,
                signatures: ISO_SIGS,
                extensions: &["iso"],
                factory: iso_factory,
            },
        ];

        Self {
            stream_formats,
            archive_formats,
            disabled_archive_formats: HashMap::new(),
        }
    }

    pub fn stream_formats(&self) -> &[StreamFormatEntry] {
        &self.stream_formats
    }

    pub fn archive_formats(&self) -> impl Iterator<Item = &ArchiveFormatEntry> {
        self.archive_formats
            .iter()
            .filter(move |e| !self.disabled_archive_formats.contains_key(&e.format))
    }

    /// compound extensions that must be matched before their simple suffix
    /// (`foo.tar.gz` must resolve as tar-over-gzip, not as a bare `.gz`)
    pub fn compound_tar_extensions() -> &'static [(&'static str, ArchiveFormat)] {
        &[
            ("tar.gz", ArchiveFormat::TarGz),
            ("tgz", ArchiveFormat::TarGz),
            ("tar.bz2", ArchiveFormat::TarBz2),
            ("tbz", ArchiveFormat::TarBz2),
            ("tbz2", ArchiveFormat::TarBz2),
            ("tar.xz", ArchiveFormat::TarXz),
            ("txz", ArchiveFormat::TarXz),
            ("tar.zst", ArchiveFormat::TarZstd),
            ("tzst", ArchiveFormat::TarZstd),
            ("tar.lz4", ArchiveFormat::TarLz4),
        ]
    }

    /// register a reader format the builtin table doesn't carry (or override
    /// one it does, by re-registering the same key); extends rather than the
    /// teacher's hardcoded six-variant match
    pub fn register_reader(&mut self, entry: ArchiveFormatEntry) {
        self.disabled_archive_formats.remove(&entry.format);
        self.archive_formats.retain(|e| e.format != entry.format);
        self.archive_formats.push(entry);
    }

    pub fn unregister_reader(&mut self, format: ArchiveFormat) {
        self.disabled_archive_formats.insert(format, ());
    }

    pub fn register_stream_handler(&mut self, entry: StreamFormatEntry) {
        self.stream_formats.retain(|e| e.format != entry.format);
        self.stream_formats.push(entry);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// the process-wide registry the detector and `open_archive` consult;
/// mutating it through [`register_reader`]/[`unregister_reader`] affects
/// every subsequent detection and open, matching the "callers may register
/// or unregister entries at runtime" contract (§4.1)
static GLOBAL_REGISTRY: once_cell::sync::Lazy<std::sync::Mutex<Registry>> =
    once_cell::sync::Lazy::new(|| std::sync::Mutex::new(Registry::with_builtins()));

/// a snapshot of the current global registry; cheap, since the table is
/// small and lookups are linear regardless
pub fn global() -> Registry {
    GLOBAL_REGISTRY.lock().unwrap().clone()
}

pub fn register_reader(entry: ArchiveFormatEntry) {
    GLOBAL_REGISTRY.lock().unwrap().register_reader(entry);
}

pub fn unregister_reader(format: ArchiveFormat) {
    GLOBAL_REGISTRY.lock().unwrap().unregister_reader(format);
}

pub fn register_stream_handler(entry: StreamFormatEntry) {
    GLOBAL_REGISTRY.lock().unwrap().register_stream_handler(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_every_stream_format() {
        let registry = Registry::with_builtins();
        let formats: Vec<_> = registry.stream_formats().iter().map(|e| e.format).collect();
        for f in [
            StreamFormat::Gzip,
            StreamFormat::Bzip2,
            StreamFormat::Xz,
            StreamFormat::Zstd,
            StreamFormat::Lz4,
            StreamFormat::Brotli,
            StreamFormat::Zlib,
            StreamFormat::UnixCompress,
        ] {
            assert!(formats.contains(&f), "missing stream format {f:?}");
        }
    }

    #[test]
    fn unregister_hides_a_format_until_reregistered() {
        let mut registry = Registry::with_builtins();
        assert!(registry
            .archive_formats()
            .any(|e| e.format == ArchiveFormat::Zip));
        registry.unregister_reader(ArchiveFormat::Zip);
        assert!(!registry
            .archive_formats()
            .any(|e| e.format == ArchiveFormat::Zip));
        registry.register_reader(ArchiveFormatEntry {
            format: ArchiveFormat::Zip,
            signatures: ZIP_SIGS,
            extensions: &["zip"],
            factory: zip_factory,
        });
        assert!(registry
            .archive_formats()
            .any(|e| e.format == ArchiveFormat::Zip));
    }
}
