//! Private single-peer UDP binding
//!
//! Each session owns one [`PrivateTransport`]. The first accepted datagram
//! fixes the peer address for the lifetime of the socket; anything arriving
//! from elsewhere afterwards is logged and dropped. The transport never
//! retries: resending is the session's business.

use crate::error::TransportError;
use log::{debug, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use tokio::net::UdpSocket;

#[derive(Debug)]
pub struct PrivateTransport {
    socket: UdpSocket,
    /// Clone of `socket` used for sends outside the async context
    sender: std::net::UdpSocket,
    expected_ip: Option<IpAddr>,
    remote: OnceLock<SocketAddr>,
}

impl PrivateTransport {
    /// Binds a socket at `addr`; port 0 lets the OS pick an ephemeral port
    ///
    /// When `expected_ip` is set, the first datagram is only accepted if it
    /// comes from that IP.
    pub async fn bind(addr: &str, expected_ip: Option<IpAddr>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?.into_std()?;
        let sender = socket.try_clone()?;
        let socket = UdpSocket::from_std(socket)?;
        debug!("Private transport bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            sender,
            expected_ip,
            remote: OnceLock::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The learned peer address, if any datagram has been accepted yet
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote.get().copied()
    }

    /// Checks a datagram's sender against the learned peer
    ///
    /// Learns `from` if no peer is known yet. Returns false if the datagram
    /// must be dropped.
    pub fn accept_from(&self, from: SocketAddr) -> bool {
        if self.remote.get().is_none() {
            if let Some(ip) = self.expected_ip {
                if from.ip() != ip {
                    warn!(
                        "Rejecting first packet from {}: expected a client at {}",
                        from, ip
                    );
                    return false;
                }
            }
        }

        let remote = *self.remote.get_or_init(|| from);
        if remote != from {
            warn!(
                "Rejecting packet received from wrong address: {} != {}",
                from, remote
            );
            return false;
        }
        true
    }

    /// Waits for the next datagram from the peer
    ///
    /// Datagrams from other senders are dropped inside this call and never
    /// surface to the caller.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await?;
            if self.accept_from(from) {
                return Ok(len);
            }
        }
    }

    /// Sends one datagram to the learned peer
    ///
    /// Never waits: if the kernel send buffer is full the datagram is
    /// reported as failed, like any other UDP loss.
    pub fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let remote = self.remote_addr().ok_or(TransportError::NoRemoteAddress)?;
        self.sender.send_to(bytes, remote)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_first_sender_is_learned() {
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();
        assert_eq!(transport.remote_addr(), None);

        assert!(transport.accept_from(addr("127.0.0.1:5000")));
        assert_eq!(transport.remote_addr(), Some(addr("127.0.0.1:5000")));
    }

    #[tokio::test]
    async fn test_second_sender_is_rejected() {
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();

        assert!(transport.accept_from(addr("127.0.0.1:5000")));
        assert!(!transport.accept_from(addr("127.0.0.1:5001")));
        assert!(!transport.accept_from(addr("10.0.0.1:5000")));
        assert!(transport.accept_from(addr("127.0.0.1:5000")));
        assert_eq!(transport.remote_addr(), Some(addr("127.0.0.1:5000")));
    }

    #[tokio::test]
    async fn test_expected_ip_guards_first_packet() {
        let transport = PrivateTransport::bind("127.0.0.1:0", Some("10.1.1.1".parse().unwrap()))
            .await
            .unwrap();

        assert!(!transport.accept_from(addr("10.2.2.2:4000")));
        assert_eq!(transport.remote_addr(), None);
        assert!(transport.accept_from(addr("10.1.1.1:4000")));
    }

    #[tokio::test]
    async fn test_send_without_remote_fails() {
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();
        let result = transport.send(b"hello");
        assert!(matches!(result, Err(TransportError::NoRemoteAddress)));
    }

    #[tokio::test]
    async fn test_recv_filters_foreign_datagrams() {
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();
        let target = transport.local_addr().unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let intruder = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        peer.send_to(b"first", target).await.unwrap();
        let mut buf = [0u8; 64];
        let len = transport.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"first");

        intruder.send_to(b"spoofed", target).await.unwrap();
        peer.send_to(b"second", target).await.unwrap();
        let len = timeout(Duration::from_secs(1), transport.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"second");
        assert_eq!(transport.remote_addr(), Some(peer.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn test_send_targets_learned_peer() {
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        assert!(transport.accept_from(peer.local_addr().unwrap()));

        transport.send(b"reply").unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"reply");
        assert_eq!(from, transport.local_addr().unwrap());
    }
}
