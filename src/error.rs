//! Typed errors for the capture and streaming pipeline.
//!
//! Every fallible operation returns `Result<T, StreamError>`. The capture
//! loop decides retry and backoff per variant instead of swallowing
//! failures uniformly.

use thiserror::Error;

/// The canonical error type for the streamer.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Capture ──────────────────────────────────────────────────
    /// The requested capture rectangle is malformed or out of bounds.
    #[error("invalid capture region: {0}")]
    InvalidRegion(&'static str),

    /// The capture surface could not be accessed (no display,
    /// missing permissions, monitor disconnected).
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    // ── Device link ──────────────────────────────────────────────
    /// The datagram could not be handed to the network stack.
    #[error("device send failed: {0}")]
    DeviceSendFailure(#[from] std::io::Error),

    /// A one-shot send payload did not match the device buffer size.
    #[error("device frame must be exactly {expected} bytes, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    // ── Preview ──────────────────────────────────────────────────
    /// JPEG encoding of a preview frame failed.
    #[error("preview encode failed: {0}")]
    PreviewEncode(String),

    // ── Stream lifecycle ─────────────────────────────────────────
    /// `start` was called while a stream is active.
    #[error("stream already running")]
    AlreadyRunning,

    /// `stop` was called with no stream active.
    #[error("no stream is running")]
    NotRunning,

    /// Frame rate or quality outside the accepted range.
    #[error("invalid stream config: {0}")]
    InvalidConfig(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = StreamError::InvalidFrameLength {
            expected: 1024,
            actual: 17,
        };
        assert!(e.to_string().contains("1024"));
        assert!(e.to_string().contains("17"));

        let e = StreamError::InvalidRegion("zero-sized region");
        assert!(e.to_string().contains("zero-sized"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NetworkUnreachable, "no route");
        let e: StreamError = io_err.into();
        assert!(matches!(e, StreamError::DeviceSendFailure(_)));
    }
}
