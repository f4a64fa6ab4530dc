use bytes::Bytes;
use reqmux::codec::{LengthPrefixed, ReadPacket, WritePacket};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// A bare-bones test client speaking the same length-prefixed framing the
/// dispatcher's reference codec uses, so tests can drive a dispatcher
/// end-to-end over real sockets without depending on dispatcher internals.
///
/// Read and write halves are kept separate (like the dispatcher's own
/// connection handling) so tests can half-close the write side while still
/// reading any responses still in flight.
pub struct TestClient {
    reader: LengthPrefixed<OwnedReadHalf>,
    writer: Option<LengthPrefixed<OwnedWriteHalf>>,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: LengthPrefixed::new(read_half),
            writer: Some(LengthPrefixed::new(write_half)),
        }
    }

    pub async fn send(&mut self, body: &[u8]) {
        self.writer
            .as_mut()
            .expect("write half already half-closed")
            .write_packet(Bytes::copy_from_slice(body))
            .await
            .expect("write_packet");
    }

    pub async fn recv(&mut self) -> Option<Bytes> {
        self.reader.read_packet().await.expect("read_packet")
    }

    /// Closes the write side only, leaving the read side usable for
    /// whatever responses are still in flight.
    pub async fn half_close(&mut self) {
        self.writer = None;
    }
}

pub async fn bind_loopback() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    (listener, addr)
}
