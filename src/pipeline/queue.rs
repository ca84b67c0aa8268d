//! Bounded preview frame queue
//!
//! Single producer (the capture loop), drained by the preview hub.
//! Insertion never blocks: when the queue holds 10 frames the incoming
//! frame is dropped, so a stalled consumer can never back up into the
//! capture cadence. Extraction blocks up to a timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;

use crate::assets::FRAME_QUEUE_CAPACITY;

/// Capacity-bounded FIFO of encoded preview frames.
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<Inner>,
}

struct Inner {
    tx: mpsc::Sender<Bytes>,
    rx: Mutex<mpsc::Receiver<Bytes>>,
    // depth can transiently read one off under concurrent push/pop, so
    // it is signed and clamped on read
    depth: AtomicI64,
    dropped: AtomicU64,
    accepting: AtomicBool,
}

impl FrameQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
                depth: AtomicI64::new(0),
                dropped: AtomicU64::new(0),
                accepting: AtomicBool::new(true),
            }),
        }
    }

    /// Non-blocking insert. Returns false when the frame was discarded,
    /// either because the queue is full or because it is closed between
    /// streams.
    pub fn push(&self, frame: Bytes) -> bool {
        if !self.inner.accepting.load(Ordering::Acquire) {
            return false;
        }
        match self.inner.tx.try_send(frame) {
            Ok(()) => {
                self.inner.depth.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 30 == 1 {
                    warn!("preview queue full, {dropped} frames dropped so far");
                }
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("preview queue receiver gone");
                false
            }
        }
    }

    /// Wait up to `wait` for the next frame; None on timeout.
    pub async fn pop(&self, wait: Duration) -> Option<Bytes> {
        let mut rx = self.inner.rx.lock().await;
        match timeout(wait, rx.recv()).await {
            Ok(Some(frame)) => {
                self.inner.depth.fetch_sub(1, Ordering::Relaxed);
                Some(frame)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Discard everything currently queued; returns the number of frames
    /// removed.
    pub async fn drain(&self) -> usize {
        let mut rx = self.inner.rx.lock().await;
        let mut removed = 0i64;
        while rx.try_recv().is_ok() {
            removed += 1;
        }
        if removed > 0 {
            self.inner.depth.fetch_sub(removed, Ordering::Relaxed);
        }
        removed as usize
    }

    /// Stop accepting frames (between streams).
    pub(crate) fn close(&self) {
        self.inner.accepting.store(false, Ordering::Release);
    }

    /// Resume accepting frames for a new stream.
    pub(crate) fn open(&self) {
        self.inner.accepting.store(true, Ordering::Release);
    }

    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
