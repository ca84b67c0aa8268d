//! Timer-driven capture loop
//!
//! Owns one active stream: pulls frames from the source, rasterizes them
//! for the device, fires the datagram and enqueues the preview copy. The
//! loop recovers from every per-frame failure and terminates only
//! through its cancellation token, observed once per tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::assets::{CAPTURE_RETRY_DELAY, TICK_YIELD};
use crate::capture::FrameSource;
use crate::config::StreamConfig;
use crate::encoder::{oled, preview};
use crate::error::StreamError;
use crate::net::Transport;

use super::queue::FrameQueue;

pub(crate) struct CaptureLoop<S, T> {
    source: S,
    transport: T,
    config: StreamConfig,
    queue: FrameQueue,
    frames: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl<S: FrameSource, T: Transport> CaptureLoop<S, T> {
    pub(crate) fn new(
        source: S,
        transport: T,
        config: StreamConfig,
        queue: FrameQueue,
        frames: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            transport,
            config,
            queue,
            frames,
            cancel,
        }
    }

    /// Tick at `1/fps` until cancelled.
    ///
    /// Best-effort cadence: the elapsed-time check skips no-op wakeups
    /// but does not correct for drift, so sustained contention stretches
    /// the interval rather than bursting to catch up.
    pub(crate) async fn run(mut self) {
        let interval = Duration::from_secs_f64(1.0 / self.config.fps() as f64);
        // fire the first frame immediately
        let mut last_frame = Instant::now() - interval;
        info!(
            "capture loop started: {} fps, preview quality {}",
            self.config.fps(),
            self.config.quality()
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if last_frame.elapsed() >= interval {
                match self.tick().await {
                    Ok(()) => {
                        last_frame = Instant::now();
                        self.frames.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("capture tick failed: {e}, retrying in {CAPTURE_RETRY_DELAY:?}");
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = sleep(CAPTURE_RETRY_DELAY) => {}
                        }
                    }
                }
            } else {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = sleep(TICK_YIELD) => {}
                }
            }
        }

        debug!(
            "capture loop stopped after {} frames",
            self.frames.load(Ordering::Relaxed)
        );
    }

    /// One frame through the whole pipeline.
    ///
    /// A failed device send is logged and swallowed (the link is lossy
    /// by design); capture and encode failures propagate so `run` can
    /// back off before retrying.
    async fn tick(&mut self) -> Result<(), StreamError> {
        let raw = self.source.capture(self.config.region())?;
        let device_frame = oled::rasterize(&raw)?;

        if let Err(e) = self.transport.send_frame(&device_frame).await {
            warn!("device send failed: {e}");
        }

        let jpeg = preview::encode_jpeg(&raw, self.config.quality())?;
        self.queue.push(jpeg);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{RawFrame, Region};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::AtomicUsize;

    struct SolidSource {
        failures_left: u32,
    }

    impl FrameSource for SolidSource {
        fn capture(&mut self, _region: Option<Region>) -> Result<RawFrame, StreamError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(StreamError::CaptureUnavailable("display asleep".into()));
            }
            RawFrame::new(8, 8, vec![200; 8 * 8 * 3])
        }
    }

    #[derive(Clone)]
    struct CountingTransport {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send_frame(&self, frame: &crate::encoder::DeviceFrame) -> Result<(), StreamError> {
            assert_eq!(frame.as_bytes().len(), 1024);
            if self.fail {
                return Err(StreamError::DeviceSendFailure(std::io::Error::other(
                    "unreachable",
                )));
            }
            self.sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn test_config() -> StreamConfig {
        StreamConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 30, 50).unwrap()
    }

    #[tokio::test]
    async fn loop_processes_frames_until_cancelled() {
        let queue = FrameQueue::new();
        let frames = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let sent = Arc::new(AtomicUsize::new(0));

        let lp = CaptureLoop::new(
            SolidSource { failures_left: 0 },
            CountingTransport {
                sent: sent.clone(),
                fail: false,
            },
            test_config(),
            queue.clone(),
            frames.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(lp.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();

        let processed = frames.load(Ordering::Relaxed);
        assert!(processed >= 2, "only {processed} frames processed");
        assert_eq!(sent.load(Ordering::Relaxed) as u64, processed);
        assert!(queue.depth() > 0);
    }

    #[tokio::test]
    async fn send_failures_do_not_stall_the_loop() {
        let queue = FrameQueue::new();
        let frames = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let lp = CaptureLoop::new(
            SolidSource { failures_left: 0 },
            CountingTransport {
                sent: Arc::new(AtomicUsize::new(0)),
                fail: true,
            },
            test_config(),
            queue.clone(),
            frames.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(lp.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();

        // frames keep flowing to the preview even though every datagram failed
        assert!(frames.load(Ordering::Relaxed) >= 2);
        assert!(queue.depth() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_backs_off_then_recovers() {
        let queue = FrameQueue::new();
        let frames = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let lp = CaptureLoop::new(
            SolidSource { failures_left: 2 },
            CountingTransport {
                sent: Arc::new(AtomicUsize::new(0)),
                fail: false,
            },
            test_config(),
            queue,
            frames.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(lp.run());

        // two failed ticks cost two backoff periods before frames flow
        tokio::time::sleep(CAPTURE_RETRY_DELAY * 2 + Duration::from_millis(500)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(frames.load(Ordering::Relaxed) >= 1);
    }

    #[tokio::test]
    async fn cancellation_is_prompt_mid_backoff() {
        let queue = FrameQueue::new();
        let cancel = CancellationToken::new();

        let lp = CaptureLoop::new(
            SolidSource { failures_left: u32::MAX },
            CountingTransport {
                sent: Arc::new(AtomicUsize::new(0)),
                fail: false,
            },
            test_config(),
            queue,
            Arc::new(AtomicU64::new(0)),
            cancel.clone(),
        );
        let handle = tokio::spawn(lp.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        // the loop must exit well before the 1s retry delay elapses
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("loop did not observe cancellation")
            .unwrap();
    }
}
