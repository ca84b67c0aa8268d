use std::time::Duration;

// display geometry (SSD1306 128x64; the lower 48 rows carry the image)
pub const CANVAS_WIDTH: usize = 128;
pub const CANVAS_HEIGHT: usize = 48;
pub const PAGE_COUNT: usize = 8;
pub const RESERVED_PAGES: usize = 2;
pub const DEVICE_FRAME_LEN: usize = PAGE_COUNT * CANVAS_WIDTH;

// device link
pub const DEVICE_PORT: u16 = 8888;

// streaming
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 30;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;
pub const DEFAULT_FPS: u32 = 10;
pub const DEFAULT_QUALITY: u8 = 50;
pub const ONESHOT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_DEVICE_ADDR: &str = "192.168.1.100";

// preview distribution
pub const FRAME_QUEUE_CAPACITY: usize = 10;
pub const SUBSCRIBER_BUFFER: usize = 4;
pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(1);

// capture loop cadence
pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const TICK_YIELD: Duration = Duration::from_micros(500);
