//! raw zlib-wrapped single-stream decompression (no dedicated container
//! format of its own; see `ArchiveFormat::single_file_compressed`)

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use flate2::read::ZlibDecoder;
use std::sync::Arc;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder = Arc::new(|s: SharedSource| {
        Box::new(ZlibDecoder::new(s)) as Box<dyn std::io::Read + Send>
    });
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
