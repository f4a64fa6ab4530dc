//! A reference [`UpstreamQueue`] backed by a single persistent TCP
//! connection to a real target.
//!
//! This is demo/reference material, not part of the dispatcher's tested
//! core: a real deployment almost always has its own upstream queue
//! (connection pooling, health checks, a richer wire protocol) and only
//! needs to implement [`UpstreamQueue`] to plug into [`crate::Dispatcher`].
//! This implementation exists so the crate has something runnable end to
//! end, built on the same "one client, one socket" shape as a hand-rolled
//! RESP client, generalized to multiplex many concurrent requests over
//! that one socket by tagging each with a cookie.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::net::ToSocketAddrs;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, warn};

use crate::codec::{LengthPrefixed, ReadPacket, WritePacket};

use super::{UpstreamFailure, UpstreamQueue};

const COOKIE_LEN: usize = 8;

type Waiters = Arc<DashMap<u64, oneshot::Sender<Bytes>>>;

/// A single-target upstream client that tags every request with a
/// monotonic cookie and demultiplexes responses off one background reader
/// task.
#[derive(Debug)]
pub struct TcpUpstream {
    writer: Mutex<LengthPrefixed<tokio::net::tcp::OwnedWriteHalf>>,
    next_cookie: AtomicU64,
    waiters: Waiters,
    dead: Arc<AtomicBool>,
}

impl TcpUpstream {
    /// Connects to `addr` and starts the background response-demuxing task.
    pub async fn connect(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let waiters: Waiters = Arc::new(DashMap::new());
        let dead = Arc::new(AtomicBool::new(false));

        tokio::spawn(demux_loop(
            LengthPrefixed::new(read_half),
            waiters.clone(),
            dead.clone(),
        ));

        Ok(Self {
            writer: Mutex::new(LengthPrefixed::new(write_half)),
            next_cookie: AtomicU64::new(0),
            waiters,
            dead,
        })
    }
}

impl UpstreamQueue for TcpUpstream {
    async fn enqueue(&self, request: Bytes) -> Result<Bytes, UpstreamFailure> {
        if self.dead.load(Ordering::Acquire) {
            return Err(UpstreamFailure);
        }

        let cookie = self.next_cookie.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(cookie, tx);

        let mut framed = BytesMut::with_capacity(COOKIE_LEN + request.len());
        framed.put_u64(cookie);
        framed.extend_from_slice(&request);

        let write_result = {
            let mut writer = self.writer.lock().await;
            writer.write_packet(framed.freeze()).await
        };

        if let Err(err) = write_result {
            warn!(%err, "failed to write request upstream");
            self.waiters.remove(&cookie);
            self.dead.store(true, Ordering::Release);
            return Err(UpstreamFailure);
        }

        rx.await.map_err(|_| UpstreamFailure)
    }
}

/// Reads response frames off `reader` for as long as the target connection
/// stays up, matching each one to its waiter by cookie. On EOF or a read
/// error, every still-pending waiter is dropped (which turns their
/// `rx.await` into `Err(UpstreamFailure)`), and `dead` is set so that no
/// further request is even attempted.
async fn demux_loop<R: ReadPacket>(mut reader: R, waiters: Waiters, dead: Arc<AtomicBool>) {
    loop {
        match reader.read_packet().await {
            Ok(Some(mut frame)) => {
                if frame.len() < COOKIE_LEN {
                    error!("response frame shorter than a cookie, dropping target connection");
                    break;
                }
                let cookie = frame.get_u64();
                let body = frame;
                if let Some((_, tx)) = waiters.remove(&cookie) {
                    let _ = tx.send(body);
                }
            }
            Ok(None) => {
                warn!("upstream target closed the connection");
                break;
            }
            Err(err) => {
                error!(%err, "upstream read failed");
                break;
            }
        }
    }

    dead.store(true, Ordering::Release);
    waiters.clear();
}
