//! Primary-display frame source backed by `xcap`.

use image::{DynamicImage, RgbaImage, imageops};
use xcap::Monitor;

use crate::error::StreamError;

use super::{FrameSource, RawFrame, Region};

/// Captures the primary monitor (first monitor when none is marked
/// primary). Monitors are re-enumerated on every capture so a display
/// that goes away surfaces as `CaptureUnavailable` instead of a stale
/// handle.
pub struct ScreenSource;

impl ScreenSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScreenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for ScreenSource {
    fn capture(&mut self, region: Option<Region>) -> Result<RawFrame, StreamError> {
        let monitors =
            Monitor::all().map_err(|e| StreamError::CaptureUnavailable(e.to_string()))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| StreamError::CaptureUnavailable("no display found".into()))?;

        let shot = monitor
            .capture_image()
            .map_err(|e| StreamError::CaptureUnavailable(e.to_string()))?;
        let (width, height) = (shot.width(), shot.height());

        frame_from_rgba(width, height, shot.into_raw(), region)
    }
}

/// Convert a captured RGBA buffer into an RGB frame, applying the
/// optional crop. Split out from the `xcap` call so the conversion is
/// testable without a live display.
fn frame_from_rgba(
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    region: Option<Region>,
) -> Result<RawFrame, StreamError> {
    let image: RgbaImage = RgbaImage::from_raw(width, height, rgba)
        .ok_or(StreamError::InvalidRegion("pixel buffer length mismatch"))?;

    let image = match region {
        Some(region) => {
            region.checked_within(width, height)?;
            imageops::crop_imm(&image, region.x, region.y, region.width, region.height).to_image()
        }
        None => image,
    };

    let (width, height) = image.dimensions();
    let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
    RawFrame::new(width, height, rgb.into_raw())
}
