//! generic rewind-and-replay adapter turning any purely-sequential
//! decompressor into a seekable [`Stream`]
//!
//! Grounded on `original_source/src/archivey/formats/decompressors.py`'s
//! `DecompressorStream`: forward seeks within the buffered window trim the
//! buffer, forward seeks past it discard-read, and backward seeks rewind the
//! underlying source to byte 0 and rebuild the decoder from scratch.

use super::{DecoderFactory, SharedSource, Stream};
use crate::error::{ArchiveError, Result};
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

const CHUNK_SIZE: usize = 64 * 1024;

pub struct DecompressorStream {
    source: SharedSource,
    make_decoder: DecoderFactory,
    decoder: Box<dyn Read + Send>,
    buffer: VecDeque<u8>,
    pos: u64,
    size: Option<u64>,
    eof: bool,
}

impl DecompressorStream {
    pub fn new(source: SharedSource, make_decoder: DecoderFactory) -> Self {
        let decoder = make_decoder(source.clone());
        Self {
            source,
            make_decoder,
            decoder,
            buffer: VecDeque::new(),
            pos: 0,
            size: None,
            eof: false,
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.decoder = (self.make_decoder)(self.source.clone());
        self.buffer.clear();
        self.pos = 0;
        self.eof = false;
        self.size = None;
        Ok(())
    }

    /// pulls one more chunk of decompressed bytes into the buffer; returns
    /// `false` once the underlying decoder is exhausted
    fn fill_chunk(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = match self.decoder.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ArchiveError::EOFError(e.to_string()));
            }
            Err(e) => return Err(ArchiveError::IOError(e)),
        };
        if n == 0 {
            self.eof = true;
            self.size = Some(self.pos + self.buffer.len() as u64);
            return Ok(false);
        }
        self.buffer.extend(chunk[..n].iter().copied());
        Ok(true)
    }

    fn seek_to_pos(&mut self, target: u64) -> Result<()> {
        if target == self.pos {
            return Ok(());
        }
        if target < self.pos {
            self.rewind()?;
        }
        loop {
            let available = self.pos + self.buffer.len() as u64;
            if available >= target {
                let drop_n = (target - self.pos) as usize;
                self.buffer.drain(..drop_n);
                self.pos = target;
                return Ok(());
            }
            self.pos += self.buffer.len() as u64;
            self.buffer.clear();
            if !self.fill_chunk()? {
                // position is past EOF
                self.pos = target;
                return Ok(());
            }
        }
    }
}

impl Read for DecompressorStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.len() < buf.len() && !self.eof {
            self.fill_chunk()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        let n = buf.len().min(self.buffer.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.buffer.pop_front().unwrap();
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for DecompressorStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target: i64 = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.pos as i64 + n,
            SeekFrom::End(n) => {
                if self.size.is_none() {
                    while self
                        .fill_chunk()
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                    {}
                }
                self.size.unwrap() as i64 + n
            }
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek to negative position {target}"),
            ));
        }
        self.seek_to_pos(target as u64)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(self.pos)
    }
}

impl Stream for DecompressorStream {
    fn seekable(&self) -> bool {
        true
    }

    fn size_hint(&self) -> Option<u64> {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn identity_source(data: Vec<u8>) -> SharedSource {
        SharedSource::new(Box::new(Cursor::new(data)))
    }

    #[test]
    fn rewind_seek_reproduces_earlier_reads() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let source = identity_source(data.clone());
        let make_decoder: DecoderFactory = Arc::new(|s| Box::new(s) as Box<dyn Read + Send>);
        let mut stream = DecompressorStream::new(source, make_decoder);

        let mut first = vec![0u8; 4096];
        stream.read_exact(&mut first).unwrap();

        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut second = vec![0u8; 4096];
        stream.read_exact(&mut second).unwrap();

        assert_eq!(first, second);
        assert_eq!(&first[..], &data[..4096]);
    }

    #[test]
    fn seek_from_end_forces_full_read_and_caches_size() {
        let data = b"hello world".to_vec();
        let source = identity_source(data.clone());
        let make_decoder: DecoderFactory = Arc::new(|s| Box::new(s) as Box<dyn Read + Send>);
        let mut stream = DecompressorStream::new(source, make_decoder);

        let pos = stream.seek(SeekFrom::End(-5)).unwrap();
        assert_eq!(pos, (data.len() - 5) as u64);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"world");
    }
}
