//! Stream configuration

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::assets::{MAX_FPS, MAX_QUALITY, MIN_FPS, MIN_QUALITY};
use crate::capture::Region;
use crate::error::StreamError;

/// Settings fixed for the lifetime of one stream, validated at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    device_addr: IpAddr,
    fps: u32,
    quality: u8,
    region: Option<Region>,
}

impl StreamConfig {
    /// Build a config, rejecting out-of-range frame rates and qualities.
    pub fn new(device_addr: IpAddr, fps: u32, quality: u8) -> Result<Self, StreamError> {
        if !(MIN_FPS..=MAX_FPS).contains(&fps) {
            return Err(StreamError::InvalidConfig("fps must be within 1..=30"));
        }
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(StreamError::InvalidConfig("quality must be within 1..=100"));
        }
        Ok(Self {
            device_addr,
            fps,
            quality,
            region: None,
        })
    }

    /// Restrict the capture to a subrectangle of the primary display.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn device_addr(&self) -> IpAddr {
        self.device_addr
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
