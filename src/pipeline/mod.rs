//! Streaming pipeline for oledcast
//!
//! This module owns the streaming engine that drives the pixel pipeline,
//! separating concerns between:
//! - Lifecycle: the StreamManager's run/stop state machine
//! - Cadence: the timer-driven capture loop
//! - Data transport: the bounded preview queue and its backpressure
//! - Fan-out: per-subscriber preview sessions
//!
//! # Architecture
//!
//! One capture loop exists per active stream (at most one system-wide),
//! spawned by the manager with a cancellation token. Per tick it runs
//! capture -> rasterize -> device send and drops a JPEG copy into the
//! FrameQueue without ever blocking. The PreviewHub's distributor drains
//! the queue and replicates frames to every live observer session.

mod capture_loop;
pub mod manager;
pub mod preview;
pub mod queue;
pub mod state;

pub use manager::{StreamManager, StreamStatus};
pub use preview::{PreviewEvent, PreviewHub, PreviewSession};
pub use queue::FrameQueue;
pub use state::StreamState;
