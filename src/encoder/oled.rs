//! Rasterizes raw frames into the display's page buffer.
//!
//! The transform is a pure function chain: aspect-fit the frame onto a
//! black 128x48 canvas, convert to luma, Floyd-Steinberg dither to 1-bit,
//! and pack into the page-addressed byte layout the firmware expects.
//! Identical input always yields identical output.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, RgbImage};

use crate::assets::{CANVAS_HEIGHT, CANVAS_WIDTH, DEVICE_FRAME_LEN, PAGE_COUNT, RESERVED_PAGES};
use crate::capture::RawFrame;
use crate::error::StreamError;

/// One dithered frame in the device's wire layout: 8 pages of 128
/// columns, bit `n` of `byte[page * 128 + column]` driving display row
/// `page * 8 + n`. Pages 0-1 belong to the device firmware and stay
/// zero; pages 2-7 carry the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    bytes: [u8; DEVICE_FRAME_LEN],
}

impl DeviceFrame {
    pub const LEN: usize = DEVICE_FRAME_LEN;

    /// Validate an externally supplied payload (the one-shot send path).
    pub fn from_bytes(raw: &[u8]) -> Result<Self, StreamError> {
        let bytes: [u8; DEVICE_FRAME_LEN] =
            raw.try_into()
                .map_err(|_| StreamError::InvalidFrameLength {
                    expected: DEVICE_FRAME_LEN,
                    actual: raw.len(),
                })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> [u8; DEVICE_FRAME_LEN] {
        self.bytes
    }
}

/// The 128x48 grayscale working canvas, mutated in place by error
/// diffusion and recreated for every frame.
pub struct GrayCanvas {
    pixels: Vec<f32>,
}

impl GrayCanvas {
    fn black() -> Self {
        Self {
            pixels: vec![0.0; CANVAS_WIDTH * CANVAS_HEIGHT],
        }
    }

    /// Build a canvas from raw intensities (row-major, 128x48).
    pub fn from_intensities(pixels: Vec<f32>) -> Result<Self, StreamError> {
        if pixels.len() != CANVAS_WIDTH * CANVAS_HEIGHT {
            return Err(StreamError::InvalidRegion("canvas must be 128x48"));
        }
        Ok(Self { pixels })
    }

    /// Aspect-fit `frame` onto a black canvas and convert to luma.
    ///
    /// The frame is scaled by `min(128/w, 48/h)` (upscaling included) and
    /// centered; integer centering keeps the left/right and top/bottom
    /// padding within one pixel of each other.
    pub fn from_frame(frame: &RawFrame) -> Result<Self, StreamError> {
        let rgb: RgbImage =
            ImageBuffer::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or(StreamError::InvalidRegion("pixel buffer length mismatch"))?;

        let aspect = frame.width() as f32 / frame.height() as f32;
        let target_aspect = CANVAS_WIDTH as f32 / CANVAS_HEIGHT as f32;
        let (fit_w, fit_h) = if target_aspect > aspect {
            // narrow frame, fit by height
            let h = CANVAS_HEIGHT as u32;
            let w = ((CANVAS_HEIGHT as f32 * aspect).round() as u32).max(1);
            (w, h)
        } else {
            // wide frame, fit by width
            let w = CANVAS_WIDTH as u32;
            let h = ((CANVAS_WIDTH as f32 / aspect).round() as u32).max(1);
            (w, h)
        };

        let resized = imageops::resize(&rgb, fit_w, fit_h, FilterType::Lanczos3);

        let mut canvas = Self::black();
        let dx = (CANVAS_WIDTH as u32 - fit_w) / 2;
        let dy = (CANVAS_HEIGHT as u32 - fit_h) / 2;
        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            let index = (y + dy) as usize * CANVAS_WIDTH + (x + dx) as usize;
            canvas.pixels[index] = luma;
        }
        Ok(canvas)
    }

    /// In-place Floyd-Steinberg error diffusion.
    ///
    /// Row-major scan; each pixel is thresholded at 127 and its
    /// quantization error pushed right (7/16) and to the next row at
    /// offsets -1, 0, +1 (3/16, 5/16, 1/16), skipping neighbors outside
    /// the canvas.
    pub fn dither(&mut self) {
        for y in 0..CANVAS_HEIGHT {
            for x in 0..CANVAS_WIDTH {
                let index = y * CANVAS_WIDTH + x;
                let old = self.pixels[index];
                let new = if old > 127.0 { 255.0 } else { 0.0 };
                self.pixels[index] = new;
                let err = old - new;

                if x + 1 < CANVAS_WIDTH {
                    self.pixels[index + 1] += err * 7.0 / 16.0;
                }
                if y + 1 < CANVAS_HEIGHT {
                    let below = index + CANVAS_WIDTH;
                    if x > 0 {
                        self.pixels[below - 1] += err * 3.0 / 16.0;
                    }
                    self.pixels[below] += err * 5.0 / 16.0;
                    if x + 1 < CANVAS_WIDTH {
                        self.pixels[below + 1] += err * 1.0 / 16.0;
                    }
                }
            }
        }
    }

    /// Pack the canvas into the page-addressed device layout.
    pub fn pack(&self) -> DeviceFrame {
        let mut bytes = [0u8; DEVICE_FRAME_LEN];
        for page in RESERVED_PAGES..PAGE_COUNT {
            for x in 0..CANVAS_WIDTH {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let y = (page - RESERVED_PAGES) * 8 + bit;
                    if y < CANVAS_HEIGHT && self.pixels[y * CANVAS_WIDTH + x] > 127.0 {
                        byte |= 1 << bit;
                    }
                }
                bytes[page * CANVAS_WIDTH + x] = byte;
            }
        }
        DeviceFrame { bytes }
    }

    #[cfg(test)]
    fn row_is_black(&self, y: usize) -> bool {
        self.pixels[y * CANVAS_WIDTH..(y + 1) * CANVAS_WIDTH]
            .iter()
            .all(|&p| p == 0.0)
    }

    #[cfg(test)]
    fn column_is_black(&self, x: usize) -> bool {
        (0..CANVAS_HEIGHT).all(|y| self.pixels[y * CANVAS_WIDTH + x] == 0.0)
    }
}

/// Full pixel pipeline: letterbox, grayscale, dither, pack.
pub fn rasterize(frame: &RawFrame) -> Result<DeviceFrame, StreamError> {
    let mut canvas = GrayCanvas::from_frame(frame)?;
    canvas.dither();
    Ok(canvas.pack())
}
