//! decoder for the classic Unix `compress` (`.Z`) LZW format
//!
//! No crate in the corpus wraps this format, so this is a hand-rolled
//! implementation of the variable-width LZW scheme used by `ncompress`:
//! a 2-byte magic (`1F 9D`), a flags byte (low 5 bits: max code width,
//! high bit: block-mode clear-code support), then LSB-first-packed codes
//! starting at 9 bits and growing to the max width as the dictionary fills.

use super::{BoxStream, SharedSource, Stream};
use crate::error::Result;
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

const MAGIC: [u8; 2] = [0x1F, 0x9D];
const INIT_BITS: u32 = 9;
const CLEAR_CODE: u32 = 256;

struct BitReader {
    source: SharedSource,
    buf: u64,
    bits: u32,
}

impl BitReader {
    fn new(source: SharedSource) -> Self {
        Self {
            source,
            buf: 0,
            bits: 0,
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut b = [0u8; 1];
        let n = self.source.read(&mut b)?;
        Ok(if n == 0 { None } else { Some(b[0]) })
    }

    fn read_code(&mut self, width: u32) -> io::Result<Option<u32>> {
        while self.bits < width {
            match self.read_byte()? {
                Some(byte) => {
                    self.buf |= (byte as u64) << self.bits;
                    self.bits += 8;
                }
                None => return Ok(None),
            }
        }
        let mask = (1u64 << width) - 1;
        let code = (self.buf & mask) as u32;
        self.buf >>= width;
        self.bits -= width;
        Ok(Some(code))
    }
}

pub struct UnixCompressReader {
    bits: BitReader,
    max_bits: u32,
    block_mode: bool,
    code_width: u32,
    max_code: u32,
    free_ent: u32,
    prefix: Vec<u32>,
    suffix: Vec<u8>,
    stack: Vec<u8>,
    oldcode: Option<u32>,
    finchar: u8,
    pending: VecDeque<u8>,
    header_read: bool,
    finished: bool,
}

impl UnixCompressReader {
    fn new(source: SharedSource) -> Self {
        Self {
            bits: BitReader::new(source),
            max_bits: 16,
            block_mode: true,
            code_width: INIT_BITS,
            max_code: (1 << INIT_BITS) - 1,
            free_ent: 256,
            prefix: vec![0u32; 1 << 16],
            suffix: vec![0u8; 1 << 16],
            stack: Vec::new(),
            oldcode: None,
            finchar: 0,
            pending: VecDeque::new(),
            header_read: false,
            finished: false,
        }
    }

    fn read_header(&mut self) -> io::Result<()> {
        let b0 = self.bits.read_byte()?;
        let b1 = self.bits.read_byte()?;
        let flags = self.bits.read_byte()?;
        match (b0, b1, flags) {
            (Some(m0), Some(m1), Some(flags)) if [m0, m1] == MAGIC => {
                self.max_bits = (flags & 0x1F) as u32;
                self.block_mode = flags & 0x80 != 0;
                self.free_ent = if self.block_mode { 257 } else { 256 };
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing .Z magic header",
            )),
        }
    }

    fn reset_table(&mut self) {
        self.code_width = INIT_BITS;
        self.max_code = (1 << INIT_BITS) - 1;
        self.free_ent = if self.block_mode { 257 } else { 256 };
        self.oldcode = None;
    }

    fn fill(&mut self) -> io::Result<()> {
        if !self.header_read {
            self.read_header()?;
            self.header_read = true;
        }
        let code = match self.bits.read_code(self.code_width)? {
            Some(c) => c,
            None => {
                self.finished = true;
                return Ok(());
            }
        };

        if self.block_mode && code == CLEAR_CODE {
            self.reset_table();
            return Ok(());
        }

        let oldcode = match self.oldcode {
            None => {
                if code >= 256 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "first .Z code is not a literal byte",
                    ));
                }
                self.finchar = code as u8;
                self.pending.push_back(self.finchar);
                self.oldcode = Some(code);
                return Ok(());
            }
            Some(oc) => oc,
        };

        let mut cur = code;
        if cur >= self.free_ent {
            if cur != self.free_ent {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "corrupt .Z code sequence",
                ));
            }
            self.stack.push(self.finchar);
            cur = oldcode;
        }
        while cur >= 256 {
            self.stack.push(self.suffix[cur as usize]);
            cur = self.prefix[cur as usize];
        }
        self.finchar = cur as u8;
        self.stack.push(self.finchar);
        while let Some(b) = self.stack.pop() {
            self.pending.push_back(b);
        }

        if (self.free_ent as usize) < self.prefix.len() {
            self.prefix[self.free_ent as usize] = oldcode;
            self.suffix[self.free_ent as usize] = self.finchar;
            self.free_ent += 1;
            if self.free_ent > self.max_code && self.code_width < self.max_bits {
                self.code_width += 1;
                self.max_code = (1 << self.code_width) - 1;
            }
        }
        self.oldcode = Some(code);
        Ok(())
    }
}

impl Read for UnixCompressReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() && !self.finished {
            self.fill()?;
        }
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(n)
    }
}

/// `.Z` has no meaningful random access (the dictionary is order-dependent),
/// so this is the one single-file format read purely sequentially rather
/// than through [`super::DecompressorStream`]; a non-zero seek request is
/// rejected the same way a non-seekable stream would be.
pub struct UnixCompressStream {
    reader: UnixCompressReader,
    pos: u64,
}

impl Read for UnixCompressStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for UnixCompressStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.pos),
            SeekFrom::Start(n) if n == self.pos => Ok(self.pos),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "compress (.Z) streams do not support seeking",
            )),
        }
    }
}

impl Stream for UnixCompressStream {
    fn seekable(&self) -> bool {
        false
    }
}

pub fn open(source: SharedSource) -> Result<BoxStream> {
    Ok(Box::new(UnixCompressStream {
        reader: UnixCompressReader::new(source),
        pos: 0,
    }))
}
