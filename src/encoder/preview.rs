//! JPEG encoding for the observer preview feed.

use bytes::Bytes;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::capture::RawFrame;
use crate::error::StreamError;

/// Encode a raw frame as JPEG at the given quality (1-100).
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Bytes, StreamError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| StreamError::PreviewEncode(e.to_string()))?;
    Ok(Bytes::from(buf))
}
