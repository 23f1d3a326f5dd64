//! gzip single-stream decompression, grounded on the teacher's use of
//! `flate2::read::GzDecoder` in `formats/gz.rs`

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::sync::Arc;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder = Arc::new(|s: SharedSource| {
        Box::new(MultiGzDecoder::new(s)) as Box<dyn std::io::Read + Send>
    });
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
