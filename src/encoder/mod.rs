//! Frame encoders: OLED rasterization and JPEG preview.

pub mod oled;
pub mod preview;

pub use oled::{DeviceFrame, GrayCanvas, rasterize};
