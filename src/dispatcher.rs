use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DispatcherConfig;
use crate::conn::{ConnId, ConnectionLimits};
use crate::error::{Error, Result};
use crate::listener;
use crate::upstream::UpstreamQueue;

/// What the dispatcher remembers about a live connection, for introspection
/// and logging. The registry holding these needs nothing more to support
/// O(1) insert/remove by identity.
#[derive(Debug, Clone, Copy)]
pub struct ConnHandle {
    pub peer: SocketAddr,
}

/// Accepts connections on every listener it was built with, forwards every
/// request to a single upstream target, and drains to a halt the first
/// time that target fails a request.
///
/// A thin handle around a fixed set of listener tasks plus the shared
/// admission/drain signals every connection task observes. There is no
/// dispatcher-owned mutable state on the request hot path: admission is a
/// `Semaphore`, the failed flag is a `CancellationToken`, and the
/// connection registry is a `DashMap` touched only at connection start/end.
pub struct Dispatcher<U: UpstreamQueue> {
    listeners: Vec<JoinHandle<()>>,
    connections: Arc<DashMap<ConnId, ConnHandle>>,
    admission: Arc<Semaphore>,
    drain: CancellationToken,
    conn_exit: Arc<Notify>,
    max_active: usize,
    upstream: Arc<U>,
}

impl<U: UpstreamQueue> Dispatcher<U> {
    /// Binds no sockets itself: `listeners` must already be bound (and, if
    /// desired, have `SO_REUSEADDR` etc. set) by the caller.
    pub fn new(
        listeners: Vec<TcpListener>,
        upstream: U,
        config: DispatcherConfig,
    ) -> Result<Self> {
        if listeners.is_empty() {
            return Err(Error::NoListeners);
        }

        let upstream = Arc::new(upstream);
        let admission = Arc::new(Semaphore::new(config.max_active));
        let drain = CancellationToken::new();
        let connections: Arc<DashMap<ConnId, ConnHandle>> = Arc::new(DashMap::new());
        let conn_exit = Arc::new(Notify::new());
        let limits = ConnectionLimits {
            max_inflight: config.max_inflight_per_conn,
            drop_on_write_failure: config.drop_on_write_failure,
        };

        let listener_tasks = listeners
            .into_iter()
            .map(|l| {
                tokio::spawn(listener::run(
                    l,
                    Arc::clone(&upstream),
                    Arc::clone(&admission),
                    drain.clone(),
                    limits,
                    Arc::clone(&connections),
                    Arc::clone(&conn_exit),
                ))
            })
            .collect();

        info!(max_active = config.max_active, "dispatcher started");

        Ok(Self {
            listeners: listener_tasks,
            connections,
            admission,
            drain,
            conn_exit,
            max_active: config.max_active,
            upstream,
        })
    }

    /// Number of currently admitted connections.
    pub fn active_connections(&self) -> usize {
        self.max_active - self.admission.available_permits()
    }

    /// `true` once the upstream target has failed a request.
    pub fn has_failed(&self) -> bool {
        self.drain.is_cancelled()
    }

    /// A dispatcher is alive until it has both failed and drained every
    /// connection.
    pub fn is_alive(&self) -> bool {
        !self.has_failed() || self.active_connections() > 0
    }

    /// Manually triggers drain, as if the upstream had just failed a
    /// request. Idempotent. Exposed for administrative shutdown as well as
    /// tests that want to force the drain path without an actual upstream
    /// failure.
    pub fn enter_drain(&self) {
        self.drain.cancel();
    }

    /// Resolves the first time [`Dispatcher::is_alive`] would return
    /// `false`, letting callers await full drain instead of polling.
    pub async fn closed(&self) {
        loop {
            if !self.is_alive() {
                return;
            }
            tokio::select! {
                _ = self.drain.cancelled() => {}
                _ = self.conn_exit.notified() => {}
            }
        }
    }

    /// Waits for the dispatcher to fully drain, then tears down the
    /// listener tasks. Consumes the dispatcher because there is nothing
    /// meaningful left to do with it afterward.
    ///
    /// Does not explicitly close listener sockets beyond ordinary Rust
    /// drop once each listener task exits.
    pub async fn join(mut self) {
        self.closed().await;

        debug_assert!(self.connections.is_empty());
        debug_assert_eq!(self.active_connections(), 0);
        debug_assert!(self.has_failed());

        for handle in self.listeners.drain(..) {
            if let Err(err) = handle.await {
                warn!(%err, "listener task panicked during shutdown");
            }
        }
    }

    /// A handle to the upstream queue, for integrators that want to share
    /// it with something outside the dispatcher (e.g. a metrics exporter).
    pub fn upstream(&self) -> Arc<U> {
        Arc::clone(&self.upstream)
    }
}
