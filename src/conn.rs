use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, OwnedSemaphorePermit};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::codec::{ReadPacket, WritePacket};
use crate::upstream::{UpstreamFailure, UpstreamQueue};
use crate::ConnHandle;

/// Identifies a live connection in the dispatcher's registry.
///
/// A monotonic counter rather than a raw pointer or socket fd, so the
/// registry can be a plain hash map keyed by identity instead of an
/// intrusive linked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ConnId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Per-connection tunables, forwarded from [`crate::DispatcherConfig`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub max_inflight: usize,
    pub drop_on_write_failure: bool,
}

/// Runs one client connection to completion: reads requests, forwards each
/// one upstream, writes back whichever response arrives, and tears itself
/// down once reading has stopped and every in-flight request has settled.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run<R, W, U>(
    id: ConnId,
    peer: SocketAddr,
    mut reader: R,
    mut writer: W,
    upstream: Arc<U>,
    drain: CancellationToken,
    limits: ConnectionLimits,
    connections: Arc<dashmap::DashMap<ConnId, ConnHandle>>,
    conn_exit: Arc<Notify>,
    // Held for the connection's lifetime; dropping it re-admits a pending
    // accept.
    _permit: OwnedSemaphorePermit,
) where
    R: ReadPacket + 'static,
    W: WritePacket + 'static,
    U: UpstreamQueue,
{
    let mut inflight: JoinSet<Result<bytes::Bytes, UpstreamFailure>> = JoinSet::new();
    let mut n_requests: usize = 0;
    let mut reading_stopped = false;

    loop {
        let can_read = !reading_stopped && n_requests < limits.max_inflight;

        tokio::select! {
            biased;

            _ = drain.cancelled(), if !reading_stopped => {
                debug!(%id, "drain observed, no further reads will be armed");
                reading_stopped = true;
            }

            read = reader.read_packet(), if can_read => {
                match read {
                    Ok(Some(body)) => {
                        n_requests += 1;
                        let upstream = Arc::clone(&upstream);
                        // Packet::Request -> Awaiting -> Response makes the
                        // request/response buffer handoff explicit instead
                        // of relying on manual aliasing discipline.
                        inflight.spawn(async move {
                            let mut packet = crate::Packet::new(body);
                            let request = packet.take_request();
                            let response = upstream.enqueue(request).await?;
                            packet.put_response(response);
                            Ok(packet.take_response())
                        });
                    }
                    Ok(None) => {
                        debug!(%id, "client half-closed, draining in-flight requests");
                        reading_stopped = true;
                    }
                    Err(err) => {
                        warn!(%id, %err, "read failed, draining in-flight requests");
                        reading_stopped = true;
                    }
                }
            }

            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                match joined {
                    Ok(Ok(response)) => {
                        if let Err(err) = writer.write_packet(response).await {
                            warn!(%id, %err, "write back to client failed");
                            if limits.drop_on_write_failure {
                                reading_stopped = true;
                            }
                        }
                        n_requests -= 1;
                    }
                    Ok(Err(UpstreamFailure)) => {
                        warn!(%id, "upstream failed a request, entering drain");
                        n_requests -= 1;
                        drain.cancel();
                    }
                    Err(join_err) => {
                        error!(%id, %join_err, "forwarding task panicked, entering drain");
                        n_requests -= 1;
                        drain.cancel();
                    }
                }
            }
        }

        if reading_stopped && n_requests == 0 {
            break;
        }
    }

    // Unlink from the registry, then let reader/writer/permit drop in
    // declaration order as this function returns.
    connections.remove(&id);
    conn_exit.notify_waiters();
    debug!(%id, %peer, "connection torn down");
}
