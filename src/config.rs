/// Tunables for a [`crate::Dispatcher`].
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Upper bound on concurrently admitted client connections.
    pub max_active: usize,
    /// Upper bound on concurrent in-flight requests *per connection*,
    /// applied per-connection rather than as a single global pool.
    pub max_inflight_per_conn: usize,
    /// When `true`, a write failure back to a client drops that
    /// connection instead of waiting for the next read to notice the peer
    /// is gone. Defaults to `false`: a failed write is treated as the
    /// client's own problem, not grounds to tear down the connection.
    pub drop_on_write_failure: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_active: 1024,
            max_inflight_per_conn: 32 * 1024,
            drop_on_write_failure: false,
        }
    }
}
