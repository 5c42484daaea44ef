// Peer channel primitive
// The negotiated transport (WebRTC data channel, TCP, in-process pair) is
// reduced to one capability: a bidirectional ordered byte channel. Adapters
// bridge a real transport into these halves; tests use the in-memory pair.

use tokio::sync::mpsc;

use crate::error::ChannelError;

/// One endpoint of an established bidirectional ordered byte channel.
pub struct PeerChannel {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl PeerChannel {
    /// Assemble an endpoint from raw halves. Transport adapters use this to
    /// bridge their I/O into the message layer.
    pub fn from_halves(
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Create two connected in-memory endpoints.
    pub fn pair() -> (PeerChannel, PeerChannel) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            PeerChannel {
                outbound: a_tx,
                inbound: b_rx,
            },
            PeerChannel {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }

    /// Queue a frame for the remote side.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), ChannelError> {
        self.outbound.send(bytes).map_err(|_| ChannelError::Closed)
    }

    /// Receive the next frame; None once the remote side is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Split into send/receive halves for independent tasks.
    pub fn into_halves(
        self,
    ) -> (
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        (self.outbound, self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_cross_wired() {
        let (a, mut b) = PeerChannel::pair();
        a.send(b"hello".to_vec()).unwrap();
        assert_eq!(b.recv().await.unwrap(), b"hello");

        b.send(b"hi".to_vec()).unwrap();
        let (_tx, mut rx) = a.into_halves();
        assert_eq!(rx.recv().await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped_errors() {
        let (a, b) = PeerChannel::pair();
        drop(b);
        assert!(matches!(
            a.send(b"late".to_vec()),
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_recv_sees_close() {
        let (a, mut b) = PeerChannel::pair();
        drop(a);
        assert!(b.recv().await.is_none());
    }
}
