use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::LengthPrefixed;
use crate::conn::{self, ConnId, ConnectionLimits};
use crate::upstream::UpstreamQueue;
use crate::ConnHandle;

/// The accept seam, generalized just enough to be testable: a real
/// listener always implements this with `TcpListener`, but tests can
/// inject a double that fails its first `accept()` call to exercise a
/// non-fatal accept error deterministically.
pub(crate) trait Acceptor: Send + Sync + 'static {
    fn accept(
        &self,
    ) -> impl std::future::Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send;

    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Runs one listener's accept loop for the lifetime of the dispatcher.
///
/// `accept()` itself is never gated by the semaphore: every listener stays
/// armed regardless of how many are currently parked waiting for a client,
/// so `L` listeners sharing one `Semaphore(max_active)` never consume `L`
/// permits just by existing. Only once a listener has a real client in
/// hand does it acquire a permit, and it holds off calling `accept()`
/// again until that permit is granted. That wait is what keeps
/// `n_active == max_active` from admitting more, while further incoming
/// clients simply queue in the kernel backlog instead of being handed a
/// permit up front.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run<L: Acceptor, U: UpstreamQueue>(
    listener: L,
    upstream: Arc<U>,
    admission: Arc<Semaphore>,
    drain: CancellationToken,
    limits: ConnectionLimits,
    connections: Arc<dashmap::DashMap<ConnId, ConnHandle>>,
    conn_exit: Arc<Notify>,
) {
    let local_addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".into());
    info!(%local_addr, "accepting connections");

    loop {
        let accepted = tokio::select! {
            biased;
            _ = drain.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                // Re-arm immediately rather than leave admission quiesced
                // until some unrelated connection closes.
                warn!(%local_addr, %err, "accept failed, continuing");
                continue;
            }
        };

        let permit = tokio::select! {
            biased;
            _ = drain.cancelled() => {
                // Drain observed while holding an accepted, not-yet-admitted
                // client: drop it unserved rather than admit past drain.
                drop(stream);
                break;
            }
            permit = admission.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed: dispatcher is going away
            },
        };

        if let Err(err) = stream.set_nodelay(true) {
            warn!(%peer, %err, "failed to set TCP_NODELAY, continuing anyway");
        }

        let id = ConnId::next();
        connections.insert(id, ConnHandle { peer });
        debug!(%id, %peer, "connection accepted");

        let (read_half, write_half) = stream.into_split();
        let writer = LengthPrefixed::new(write_half);
        let reader = LengthPrefixed::new(read_half);

        let upstream = Arc::clone(&upstream);
        let drain = drain.clone();
        let connections = Arc::clone(&connections);
        let conn_exit = Arc::clone(&conn_exit);

        tokio::spawn(conn::run(
            id,
            peer,
            reader,
            writer,
            upstream,
            drain,
            limits,
            connections,
            conn_exit,
            permit,
        ));
    }

    debug!(%local_addr, "listener task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::upstream::EchoUpstream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify as StdNotify;

    /// Fails the first `accept()` call with a transient error, then
    /// delegates every subsequent call to a real listener.
    struct FlakyAcceptor {
        inner: TcpListener,
        calls: AtomicUsize,
    }

    impl Acceptor for FlakyAcceptor {
        async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionAborted,
                    "simulated transient accept error",
                ));
            }
            self.inner.accept().await
        }

        fn local_addr(&self) -> std::io::Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    #[tokio::test]
    async fn transient_accept_error_does_not_stall_the_listener() {
        let bound = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = bound.local_addr().unwrap();
        let acceptor = FlakyAcceptor {
            inner: bound,
            calls: AtomicUsize::new(0),
        };

        let admission = Arc::new(Semaphore::new(DispatcherConfig::default().max_active));
        let drain = CancellationToken::new();
        let connections = Arc::new(dashmap::DashMap::new());
        let conn_exit = Arc::new(StdNotify::new());
        let upstream = Arc::new(EchoUpstream);
        let limits = ConnectionLimits {
            max_inflight: 16,
            drop_on_write_failure: false,
        };

        let task = tokio::spawn(run(
            acceptor,
            upstream,
            Arc::clone(&admission),
            drain.clone(),
            limits,
            Arc::clone(&connections),
            conn_exit,
        ));

        // The first accept() fails transiently; a real client connecting
        // afterward must still be admitted, proving the listener re-armed
        // itself instead of stalling admission.
        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(connections.len(), 1);

        drain.cancel();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), task).await;
    }
}
