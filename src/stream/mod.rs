//! the unified stream contract and the generic seekable-over-sequential
//! decompressor wrapper (C3)

pub mod brotli;
pub mod bzip2;
mod decompressor;
pub mod gzip;
pub mod lz4;
pub mod unix_compress;
pub mod xz;
pub mod zlib;
pub mod zstd;

pub use decompressor::DecompressorStream;

use crate::model::StreamFormat;
use std::io::{Read, Seek};
use std::sync::{Arc, Mutex};

/// any stream handed to or returned from a reader must be able to both read
/// and (where the backend allows it) seek; `seekable()` tells callers which
pub trait Stream: Read + Seek + Send {
    fn seekable(&self) -> bool;

    /// total decompressed size, if known without a full decode pass
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

pub type BoxStream = Box<dyn Stream>;

/// marker alias for anything that can back a [`SharedSource`]
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// a cheaply-clonable handle to a single seekable byte source, shared
/// between the stream that was opened over it and the decompressor wrapper
/// that needs to rewind it on a backward seek.
///
/// A reader is single-threaded by contract (§5), so the `Mutex` here is
/// never contended; it exists purely so the handle can satisfy `Send`
/// without resorting to unsafe aliasing of a raw pointer.
#[derive(Clone)]
pub struct SharedSource(Arc<Mutex<Box<dyn ReadSeek>>>);

impl SharedSource {
    pub fn new(inner: Box<dyn ReadSeek>) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn rewind(&self) -> std::io::Result<()> {
        self.0
            .lock()
            .unwrap()
            .seek(std::io::SeekFrom::Start(0))
            .map(|_| ())
    }

    pub fn position(&self) -> std::io::Result<u64> {
        self.0.lock().unwrap().stream_position()
    }

    /// seek the shared underlying source back to `pos`; used by the detector
    /// to restore position after probing (§8 property 7)
    pub fn rewind_to(&self, pos: u64) -> std::io::Result<()> {
        self.0.lock().unwrap().seek(std::io::SeekFrom::Start(pos))?;
        Ok(())
    }
}

impl Read for SharedSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().read(buf)
    }
}

impl Seek for SharedSource {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.0.lock().unwrap().seek(pos)
    }
}

/// a factory that builds a fresh decoder on top of the (rewound) source;
/// shared so the same closure can be invoked again after a rewind
pub type DecoderFactory = Arc<dyn Fn(SharedSource) -> Box<dyn Read + Send> + Send + Sync>;

/// the ambient config names a handful of alternate decoder backends
/// (`rapidgzip`, `indexed_bzip2`, a Python `xz` binding, a `zstandard`
/// wheel); none of those ship as Rust crates in this build, so selecting one
/// raises the same `PackageNotInstalledError` the original library raises
/// when the optional dependency behind the flag isn't importable. `Zstd` is
/// the inverse: `use_zstandard` defaults to `true` and *disabling* it is what
/// has no available fallback here.
fn check_decoder_available(format: StreamFormat, config: &crate::config::ArchiveyConfig) -> crate::error::Result<()> {
    use crate::error::ArchiveError;

    let unavailable = |name: &str| {
        Err(ArchiveError::PackageNotInstalledError(format!(
            "{name} backend is not available in this build"
        )))
    };

    match format {
        StreamFormat::Gzip if config.use_rapidgzip => unavailable("rapidgzip"),
        StreamFormat::Bzip2 if config.use_indexed_bzip2 => unavailable("indexed_bzip2"),
        StreamFormat::Xz if config.use_python_xz => unavailable("python-xz"),
        StreamFormat::Zstd if !config.use_zstandard => unavailable("zstandard"),
        _ => Ok(()),
    }
}

/// open a stream for the named compressor over `source`, dispatching through
/// the registry's `open` constructor rather than a hardcoded match so a
/// runtime `register_stream_handler` call actually changes what gets built
pub fn open(format: StreamFormat, source: SharedSource) -> crate::error::Result<BoxStream> {
    check_decoder_available(format, &crate::config::current_config())?;

    let registry = crate::registry::global();
    let entry = registry
        .stream_formats()
        .iter()
        .find(|e| e.format == format)
        .ok_or_else(|| crate::error::ArchiveError::format(format!("{format:?} support is not registered")))?;
    (entry.open)(source)
}
