//! oledcast - mirror a region of the screen onto a page-addressed OLED
//! over UDP.
//!
//! The crate is split between the pure pixel pipeline ([`encoder`]) and
//! the streaming engine ([`pipeline`]) that drives it: a capture loop
//! ticks at the configured rate, rasterizes each frame into the fixed
//! 1024-byte device layout, fires it at the device as a single datagram
//! and fans a JPEG preview out to any number of observers without ever
//! blocking. The HTTP layer that exposes these operations lives outside
//! this crate and consumes [`pipeline::StreamManager`].

pub mod assets;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod net;
pub mod pipeline;

pub use capture::{RawFrame, Region};
pub use config::StreamConfig;
pub use encoder::DeviceFrame;
pub use error::StreamError;
pub use pipeline::{PreviewEvent, PreviewSession, StreamManager, StreamStatus};
