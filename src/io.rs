//! small IO wrapper types shared by the reader and stream layers
//!
//! Kept in one file rather than scattered across the per-format readers
//! because each wrapper is a handful of lines: translating a backend's raw
//! I/O errors into [`ArchiveError`] (used by `open::open_path` to wrap the
//! freshly opened file), deferring a file open until first use (the folder
//! backend's member streams), counting bytes moved through a member stream
//! for progress reporting (see the teacher's `progress.rs`; used by the CLI's
//! hashing pass), and synthesizing a stream that always fails (the ZIP
//! backend hands one back for an encrypted member opened without a
//! password).

use crate::error::ArchiveError;
use crate::stream::{SharedSource, Stream};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// wraps any `Read + Seek` source and maps `io::Error` into the matching
/// [`ArchiveError`] variant before it crosses a public API boundary
pub struct ExceptionTranslatingIO<R> {
    inner: R,
}

impl<R> ExceptionTranslatingIO<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ExceptionTranslatingIO<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(translate)
    }
}

impl<R: Seek> Seek for ExceptionTranslatingIO<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos).map_err(translate)
    }
}

fn translate(err: io::Error) -> io::Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => {
            io::Error::new(err.kind(), ArchiveError::EOFError(err.to_string()))
        }
        _ => err,
    }
}

/// opens a file lazily on the first read or seek, so holding one of these
/// doesn't consume a file descriptor until the member is actually read
pub struct LazyOpenIO {
    path: PathBuf,
    file: Option<File>,
}

impl LazyOpenIO {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn ensure_open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

impl Read for LazyOpenIO {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?.read(buf)
    }
}

impl Seek for LazyOpenIO {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.ensure_open()?.seek(pos)
    }
}

/// counts bytes read through a member stream; readers hand one of these to
/// the progress reporter so it can track bytes without re-reading the file
pub struct StatsIO<R> {
    inner: R,
    bytes_read: u64,
}

impl<R> StatsIO<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for StatsIO<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for StatsIO<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// a stream that always returns the same error; used when a reader knows a
/// member exists (it's in the central directory or header list) but the
/// backend refuses to hand back its bytes (e.g. an unsupported compression
/// method inside an otherwise-readable ZIP)
pub struct ErrorIOStream {
    error: ArchiveError,
}

impl ErrorIOStream {
    pub fn new(error: ArchiveError) -> Self {
        Self { error }
    }

    fn io_error(&self) -> io::Error {
        io::Error::new(io::ErrorKind::Other, self.error.to_string())
    }
}

impl Read for ErrorIOStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(self.io_error())
    }
}

impl Seek for ErrorIOStream {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(self.io_error())
    }
}

impl Stream for ErrorIOStream {
    fn seekable(&self) -> bool {
        false
    }
}

/// a lazily re-seeking window over a byte range of a [`SharedSource`]
///
/// Several per-format readers (AR, ISO-9660) allow opening multiple members'
/// streams in any order over one shared underlying file handle. Rather than
/// give each stream an independent file descriptor, each read re-seeks the
/// shared handle to its own logical position first — correct even if some
/// other stream moved the handle in between, since `SharedSource` guards a
/// single `Mutex`-protected reader (see `stream::SharedSource`).
pub struct BoundedSharedStream {
    source: SharedSource,
    base_offset: u64,
    size: u64,
    pos: u64,
}

impl BoundedSharedStream {
    pub fn new(source: SharedSource, base_offset: u64, size: u64) -> Self {
        Self {
            source,
            base_offset,
            size,
            pos: 0,
        }
    }
}

impl Read for BoundedSharedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.size {
            return Ok(0);
        }
        let remaining = (self.size - self.pos) as usize;
        let want = remaining.min(buf.len());
        self.source.rewind_to(self.base_offset + self.pos)?;
        let n = self.source.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for BoundedSharedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target: i64 = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.pos as i64 + n,
            SeekFrom::End(n) => self.size as i64 + n,
        };
        if target < 0 || target as u64 > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek target out of bounds for archive member",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl Stream for BoundedSharedStream {
    fn seekable(&self) -> bool {
        true
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stats_io_tracks_bytes_read() {
        let mut stats = StatsIO::new(Cursor::new(vec![1u8, 2, 3, 4, 5]));
        let mut buf = [0u8; 3];
        stats.read(&mut buf).unwrap();
        assert_eq!(stats.bytes_read(), 3);
        stats.read(&mut buf).unwrap();
        assert_eq!(stats.bytes_read(), 5);
    }

    #[test]
    fn error_io_stream_fails_every_call() {
        let mut stream = ErrorIOStream::new(ArchiveError::EncryptedError);
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).is_err());
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn lazy_open_io_defers_until_first_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-until-read.bin");
        std::fs::write(&path, b"abc").unwrap();
        let mut lazy = LazyOpenIO::new(&path);
        let mut buf = [0u8; 3];
        lazy.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }
}
