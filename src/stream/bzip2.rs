//! bzip2 single-stream decompression, grounded on the teacher's use of the
//! `bzip2` crate for its tar.bz2 path

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use bzip2::read::MultiBzDecoder;
use std::sync::Arc;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder = Arc::new(|s: SharedSource| {
        Box::new(MultiBzDecoder::new(s)) as Box<dyn std::io::Read + Send>
    });
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
