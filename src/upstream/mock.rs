use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use super::{UpstreamFailure, UpstreamQueue};

/// Answers every request with the request's own bytes.
///
/// Used by the pipelining/admission tests in `tests/` to exercise the
/// dispatcher without a real upstream target.
#[derive(Debug, Default)]
pub struct EchoUpstream;

impl UpstreamQueue for EchoUpstream {
    async fn enqueue(&self, request: Bytes) -> Result<Bytes, UpstreamFailure> {
        Ok(request)
    }
}

/// Echoes the first `n` requests, then fails every request after that.
///
/// Used to drive an upstream-failure-mid-flight scenario deterministically.
#[derive(Debug)]
pub struct FailAfter {
    remaining: AtomicUsize,
}

impl FailAfter {
    pub fn new(successes: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(successes),
        }
    }
}

impl UpstreamQueue for FailAfter {
    async fn enqueue(&self, request: Bytes) -> Result<Bytes, UpstreamFailure> {
        loop {
            let remaining = self.remaining.load(Ordering::Acquire);
            if remaining == 0 {
                return Err(UpstreamFailure);
            }
            if self
                .remaining
                .compare_exchange(
                    remaining,
                    remaining - 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Ok(request);
            }
        }
    }
}
