//! brotli single-stream decompression
//!
//! Brotli carries no standard magic number, so detection (§4.2) is a
//! heuristic decode probe rather than a signature match; opening a stream
//! for an already-detected Brotli member is otherwise ordinary.

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use std::sync::Arc;

const BROTLI_BUFFER_SIZE: usize = 4096;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder = Arc::new(|s: SharedSource| {
        Box::new(brotli::Decompressor::new(s, BROTLI_BUFFER_SIZE)) as Box<dyn std::io::Read + Send>
    });
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
