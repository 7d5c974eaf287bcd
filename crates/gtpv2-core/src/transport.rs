use crate::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

/// Abstract datagram transport.
/// Lets a Connection run over a UDP socket or anything packet-shaped (tests, tunnels).
#[async_trait]
pub trait PacketConn: Send + Sync {
    /// Send one datagram to `target`
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    /// Receive one datagram into `buf`
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Get local address
    fn local_addr(&self) -> Result<SocketAddr>;
}

// Implement PacketConn for tokio::net::UdpSocket
#[async_trait]
impl PacketConn for tokio::net::UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        Ok(tokio::net::UdpSocket::send_to(self, buf, target).await?)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(tokio::net::UdpSocket::recv_from(self, buf).await?)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(tokio::net::UdpSocket::local_addr(self)?)
    }
}
