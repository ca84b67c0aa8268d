//! Fire-and-forget UDP delivery to the display device.
//!
//! The device link is a best-effort datagram path: one 1024-byte payload
//! per frame, no acknowledgment, no retry. Frame loss is normal
//! operation, not an error condition to recover from.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::assets::DEVICE_PORT;
use crate::encoder::DeviceFrame;
use crate::error::StreamError;

/// Delivery seam for the capture loop; swapped for a recording fake in
/// tests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send_frame(&self, frame: &DeviceFrame) -> Result<(), StreamError>;
}

/// Sends device frames to `device:8888` from an ephemeral local port.
pub struct UdpDeviceSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpDeviceSender {
    /// Bind a socket for the given device address.
    pub async fn bind(device: IpAddr) -> Result<Self, StreamError> {
        let bind_addr = if device.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self {
            socket,
            target: SocketAddr::new(device, DEVICE_PORT),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl Transport for UdpDeviceSender {
    async fn send_frame(&self, frame: &DeviceFrame) -> Result<(), StreamError> {
        self.socket.send_to(frame.as_bytes(), self.target).await?;
        Ok(())
    }
}

/// Ad-hoc single-frame send, with the failure surfaced to the caller
/// instead of being swallowed like in-loop sends.
pub async fn send_once(device: IpAddr, frame: &DeviceFrame) -> Result<(), StreamError> {
    UdpDeviceSender::bind(device).await?.send_frame(frame).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn sends_exactly_one_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sender = UdpDeviceSender::bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        // redirect at the socket level so the test does not need port 8888
        let frame = DeviceFrame::from_bytes(&[0xAB; DeviceFrame::LEN]).unwrap();
        sender
            .socket
            .send_to(frame.as_bytes(), ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; 2048];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, DeviceFrame::LEN);
        assert!(buf[..len].iter().all(|&b| b == 0xAB));
    }

    #[tokio::test]
    async fn target_uses_device_port() {
        let sender = UdpDeviceSender::bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        assert_eq!(sender.target().port(), DEVICE_PORT);
    }
}
