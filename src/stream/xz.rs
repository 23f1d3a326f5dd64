//! xz/lzma single-stream decompression, grounded on the teacher's use of
//! `xz2::read::XzDecoder` in `formats/xz.rs`

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use std::sync::Arc;
use xz2::read::XzDecoder;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder =
        Arc::new(|s: SharedSource| Box::new(XzDecoder::new(s)) as Box<dyn std::io::Read + Send>);
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
