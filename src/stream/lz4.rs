//! lz4 frame-format decompression, grounded on
//! `other_examples/68ff310e_brioche-dev-tangram_*`'s use of
//! `lz4_flex::frame::FrameDecoder`

use super::{BoxStream, DecompressorStream, SharedSource};
use crate::error::Result;
use lz4_flex::frame::FrameDecoder;
use std::sync::Arc;

pub fn open(source: SharedSource) -> Result<BoxStream> {
    let make_decoder = Arc::new(|s: SharedSource| {
        Box::new(FrameDecoder::new(s)) as Box<dyn std::io::Read + Send>
    });
    Ok(Box::new(DecompressorStream::new(source, make_decoder)))
}
