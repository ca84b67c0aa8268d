//! Stream lifecycle management
//!
//! The StreamManager owns the single run/stop state machine behind one
//! mutex, so concurrent starts cannot both succeed, and hands a fresh
//! cancellation token to every capture loop it spawns. It is also the
//! entry point for the one-shot operations the control surface exposes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::info;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::assets::ONESHOT_JPEG_QUALITY;
use crate::capture::{FrameSource, Region, ScreenSource};
use crate::config::StreamConfig;
use crate::encoder::{DeviceFrame, oled, preview};
use crate::error::StreamError;
use crate::net::{Transport, UdpDeviceSender};

use super::capture_loop::CaptureLoop;
use super::preview::{PreviewHub, PreviewSession};
use super::queue::FrameQueue;
use super::state::StreamState;

/// Snapshot returned by [`StreamManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub streaming: bool,
    pub queue_depth: usize,
}

type SourceFactory = dyn Fn() -> Box<dyn FrameSource> + Send + Sync;

/// Owns the stream state, the preview queue and the fan-out hub.
///
/// Clones share the same manager.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    state: Mutex<StreamState>,
    // token of the current stream; starts out cancelled so sessions
    // subscribed while idle end immediately
    cancel: Mutex<CancellationToken>,
    queue: FrameQueue,
    hub: PreviewHub,
    frames: Arc<AtomicU64>,
    make_source: Box<SourceFactory>,
}

impl StreamManager {
    /// Manager capturing the primary display.
    pub fn new() -> Self {
        Self::with_source(ScreenSource::new)
    }

    /// Manager with a custom frame source, e.g. a synthetic test
    /// pattern.
    pub fn with_source<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: FrameSource,
    {
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(StreamState::Idle),
                cancel: Mutex::new(cancelled),
                queue: FrameQueue::new(),
                hub: PreviewHub::new(),
                frames: Arc::new(AtomicU64::new(0)),
                make_source: Box::new(move || Box::new(factory())),
            }),
        }
    }

    /// Start streaming to the configured device address.
    ///
    /// Binding the transport here surfaces a broken socket to the caller
    /// instead of retrying it forever inside the loop.
    pub async fn start(&self, config: StreamConfig) -> Result<(), StreamError> {
        if self.inner.state.lock().unwrap().is_running() {
            return Err(StreamError::AlreadyRunning);
        }
        let transport = UdpDeviceSender::bind(config.device_addr()).await?;
        self.start_with_transport(config, transport)
    }

    /// Start streaming over a caller-supplied transport.
    pub fn start_with_transport<T: Transport>(
        &self,
        config: StreamConfig,
        transport: T,
    ) -> Result<(), StreamError> {
        let mut state = self.inner.state.lock().unwrap();
        let next = StreamState::running();
        if !state.can_transition_to(&next) {
            return Err(StreamError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock().unwrap() = token.clone();
        self.inner.frames.store(0, Ordering::Relaxed);
        self.inner.queue.open();

        self.inner
            .hub
            .run_distributor(self.inner.queue.clone(), token.clone());
        let capture_loop = CaptureLoop::new(
            (self.inner.make_source)(),
            transport,
            config,
            self.inner.queue.clone(),
            self.inner.frames.clone(),
            token,
        );
        tokio::spawn(capture_loop.run());

        *state = next;
        info!("stream started ({} fps)", config.fps());
        Ok(())
    }

    /// Signal the capture loop to stop and flush the preview queue.
    pub async fn stop(&self) -> Result<(), StreamError> {
        let ran_for = {
            let mut state = self.inner.state.lock().unwrap();
            if !state.can_transition_to(&StreamState::Idle) {
                return Err(StreamError::NotRunning);
            }
            let ran_for = state.running_duration().unwrap_or_default();
            *state = StreamState::Idle;
            self.inner.cancel.lock().unwrap().cancel();
            self.inner.queue.close();
            ran_for
        };

        let drained = self.inner.queue.drain().await;
        info!("stream stopped after {ran_for:?}, {drained} queued preview frames discarded");
        Ok(())
    }

    /// Current state without side effects.
    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            streaming: self.inner.state.lock().unwrap().is_running(),
            queue_depth: self.inner.queue.depth(),
        }
    }

    /// Frames processed by the current stream (reset on start).
    pub fn frames_streamed(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Attach a preview observer. The session yields frames and
    /// keepalives until the stream stops; subscribing while idle yields
    /// an already-ended session.
    pub fn subscribe(&self) -> PreviewSession {
        let token = self.inner.cancel.lock().unwrap().clone();
        self.inner.hub.subscribe(token)
    }

    /// Capture a single frame and return it JPEG-encoded for display.
    pub fn capture_once(&self, region: Option<Region>) -> Result<Bytes, StreamError> {
        let mut source = (self.inner.make_source)();
        let raw = source.capture(region)?;
        preview::encode_jpeg(&raw, ONESHOT_JPEG_QUALITY)
    }

    /// Run a single frame through the full pixel pipeline.
    pub fn rasterize_once(&self, region: Option<Region>) -> Result<DeviceFrame, StreamError> {
        let mut source = (self.inner.make_source)();
        let raw = source.capture(region)?;
        oled::rasterize(&raw)
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
