//! The upstream request queue collaborator.
//!
//! This is the one external party the dispatcher cannot do without: the
//! thing that actually owns the connection to the single target and
//! multiplexes requests/responses by cookie. The dispatcher core only needs
//! [`UpstreamQueue::enqueue`]; everything about how a cookie is assigned,
//! how the target connection is kept alive, or how responses are demuxed is
//! the integrator's problem.

mod mock;
pub mod tcp;

use bytes::Bytes;

pub use mock::{EchoUpstream, FailAfter};

/// Raised when the upstream target could not produce a response for a
/// request it was handed. Receiving this for any single request is fatal at
/// the dispatcher level (see [`crate::Dispatcher::enter_drain`]): the target
/// is assumed to be gone, not just the one request.
#[derive(Debug, thiserror::Error)]
#[error("upstream failed to answer the request")]
pub struct UpstreamFailure;

/// A single-target, multiplexed request/response channel.
///
/// An implementation takes ownership of exactly one request at a time per
/// call and promises exactly one resolution: `Ok(response)` or
/// `Err(UpstreamFailure)`. It must be safe to call concurrently from many
/// connection tasks at once: in practice this means cookie assignment and
/// response demultiplexing need to be internally synchronized (a
/// `DashMap`-keyed response table is the reference approach; see
/// [`tcp::TcpUpstream`]).
pub trait UpstreamQueue: Send + Sync + 'static {
    fn enqueue(
        &self,
        request: Bytes,
    ) -> impl std::future::Future<Output = Result<Bytes, UpstreamFailure>> + Send;
}
