//! Preview fan-out to live observers
//!
//! Observers register with the hub and receive every frame over their own
//! bounded channel: a slow session loses only its own copies and can
//! never block the capture loop or its peers. Sessions end when the
//! stream stops.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, info};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::assets::{KEEPALIVE_TIMEOUT, SUBSCRIBER_BUFFER};

use super::queue::FrameQueue;

/// One event on a preview session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    /// An encoded preview frame.
    Frame(Bytes),
    /// Nothing arrived within the keepalive window; the session is
    /// still live.
    Keepalive,
}

/// Subscriber registry plus the distributor that feeds it from the
/// shared frame queue.
#[derive(Clone)]
pub struct PreviewHub {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Bytes>>>>,
}

impl PreviewHub {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Attach a new observer; its session ends when `cancel` fires.
    pub fn subscribe(&self, cancel: CancellationToken) -> PreviewSession {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let live = {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
            subscribers.len()
        };
        info!("preview subscriber attached ({live} live)");
        PreviewSession { rx, cancel }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Replicate one frame to every live session, pruning closed ones.
    fn fan_out(&self, frame: Bytes) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            // a full session buffer loses this copy only
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Drain `queue` and replicate frames until `cancel` fires. All
    /// sessions are detached on the way out.
    pub(crate) fn run_distributor(
        &self,
        queue: FrameQueue,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = queue.pop(KEEPALIVE_TIMEOUT) => {
                        if let Some(frame) = frame {
                            hub.fan_out(frame);
                        }
                    }
                }
            }
            hub.subscribers.lock().unwrap().clear();
            debug!("preview distributor stopped");
        })
    }
}

impl Default for PreviewHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One observer's view of the preview feed.
pub struct PreviewSession {
    rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
}

impl PreviewSession {
    /// Next event: a frame, a keepalive after one idle second, or `None`
    /// once the stream is no longer running.
    pub async fn next_event(&mut self) -> Option<PreviewEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            received = timeout(KEEPALIVE_TIMEOUT, self.rx.recv()) => match received {
                Ok(Some(frame)) => Some(PreviewEvent::Frame(frame)),
                // the hub detached us at stream stop
                Ok(None) => None,
                Err(_) => Some(PreviewEvent::Keepalive),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscriber_receives_published_frames() {
        let hub = PreviewHub::new();
        let queue = FrameQueue::new();
        let cancel = CancellationToken::new();
        hub.run_distributor(queue.clone(), cancel.clone());

        let mut session = hub.subscribe(cancel.clone());
        queue.push(Bytes::from_static(b"jpeg-bytes"));

        let event = session.next_event().await;
        assert_eq!(
            event,
            Some(PreviewEvent::Frame(Bytes::from_static(b"jpeg-bytes")))
        );
        cancel.cancel();
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_frame() {
        let hub = PreviewHub::new();
        let queue = FrameQueue::new();
        let cancel = CancellationToken::new();
        hub.run_distributor(queue.clone(), cancel.clone());

        let mut first = hub.subscribe(cancel.clone());
        let mut second = hub.subscribe(cancel.clone());
        queue.push(Bytes::from_static(b"shared"));

        assert_eq!(
            first.next_event().await,
            Some(PreviewEvent::Frame(Bytes::from_static(b"shared")))
        );
        assert_eq!(
            second.next_event().await,
            Some(PreviewEvent::Frame(Bytes::from_static(b"shared")))
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_gets_keepalives() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(CancellationToken::new());
        assert_eq!(session.next_event().await, Some(PreviewEvent::Keepalive));
    }

    #[tokio::test]
    async fn cancelled_session_ends() {
        let hub = PreviewHub::new();
        let cancel = CancellationToken::new();
        let mut session = hub.subscribe(cancel.clone());
        cancel.cancel();
        assert_eq!(session.next_event().await, None);
    }

    #[tokio::test]
    async fn distributor_stop_detaches_sessions() {
        let hub = PreviewHub::new();
        let queue = FrameQueue::new();
        let cancel = CancellationToken::new();
        let handle = hub.run_distributor(queue.clone(), cancel.clone());

        let _session = hub.subscribe(CancellationToken::new());
        assert_eq!(hub.subscriber_count(), 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropped_sessions_are_pruned_on_fan_out() {
        let hub = PreviewHub::new();
        let session = hub.subscribe(CancellationToken::new());
        drop(session);

        hub.fan_out(Bytes::from_static(b"frame"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_its_own_copies_only() {
        let hub = PreviewHub::new();
        let cancel = CancellationToken::new();
        let mut slow = hub.subscribe(cancel.clone());

        for i in 0..SUBSCRIBER_BUFFER + 3 {
            hub.fan_out(Bytes::from(format!("frame-{i}")));
        }

        // the session buffer holds the first SUBSCRIBER_BUFFER frames
        for i in 0..SUBSCRIBER_BUFFER {
            assert_eq!(
                slow.next_event().await,
                Some(PreviewEvent::Frame(Bytes::from(format!("frame-{i}"))))
            );
        }
        // the excess copies were discarded for this session
        let extra = timeout(Duration::from_millis(50), slow.rx.recv()).await;
        assert!(extra.is_err() || extra.unwrap().is_none());
    }
}
