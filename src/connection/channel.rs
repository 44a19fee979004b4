use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{DriverError, DriverResult};

/// An abstract bidirectional frame channel.
///
/// Concrete transports (WebSocket, TCP, in-process) implement this trait;
/// the connection layer never touches sockets directly. `recv` returning
/// `None` means the channel closed; `Some(Err(_))` is a transport error,
/// which the connection treats as fatal.
#[async_trait]
pub trait Channel: Send + 'static {
    async fn send(&mut self, frame: Vec<u8>) -> DriverResult<()>;
    async fn recv(&mut self) -> Option<DriverResult<Vec<u8>>>;
}

/// An in-memory duplex channel, for tests and in-process engines.
pub struct MemoryChannel {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl MemoryChannel {
    /// Create a connected pair of endpoints; frames sent on one side arrive
    /// on the other.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, a_rx) = mpsc::channel(64);
        let (b_tx, b_rx) = mpsc::channel(64);
        (
            MemoryChannel { tx: a_tx, rx: b_rx },
            MemoryChannel { tx: b_tx, rx: a_rx },
        )
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&mut self, frame: Vec<u8>) -> DriverResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| DriverError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Option<DriverResult<Vec<u8>>> {
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_full_duplex() {
        let (mut client, mut server) = MemoryChannel::pair();

        client.send(vec![1, 2, 3]).await.unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap(), vec![1, 2, 3]);

        server.send(vec![4]).await.unwrap();
        assert_eq!(client.recv().await.unwrap().unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_recv_ends_when_peer_drops() {
        let (mut client, server) = MemoryChannel::pair();
        drop(server);
        assert!(client.recv().await.is_none());
        assert_eq!(
            client.send(vec![0]).await.unwrap_err(),
            DriverError::ConnectionClosed
        );
    }
}
