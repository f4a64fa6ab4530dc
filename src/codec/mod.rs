//! Framed packet codec.
//!
//! The dispatcher core is deliberately codec-agnostic: it only needs
//! something that yields complete request packets and something that can
//! write complete response packets. Both are external collaborators in the
//! sense that an integrator is expected to supply their own wire format by
//! implementing [`ReadPacket`]/[`WritePacket`] over their protocol; this
//! module additionally ships [`length_prefixed::LengthPrefixed`], a minimal
//! length-prefixed framing, so the crate has a runnable reference
//! implementation for its own tests and demo binary.

mod length_prefixed;

use bytes::Bytes;

pub use length_prefixed::LengthPrefixed;

/// Yields one complete request packet at a time.
///
/// At most one [`read_packet`](ReadPacket::read_packet) call is ever
/// in flight for a given reader. The dispatcher enforces this by
/// construction: only one connection task ever holds `&mut` access to a
/// reader, and that task never calls it from two places at once.
pub trait ReadPacket: Send {
    /// Reads the next packet.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (no partial frame
    /// buffered). Returns `Err` on I/O failure or a frame that doesn't
    /// parse, including a stream that closed mid-frame.
    fn read_packet(
        &mut self,
    ) -> impl std::future::Future<Output = std::io::Result<Option<Bytes>>> + Send;
}

/// Writes one complete response packet at a time.
pub trait WritePacket: Send {
    /// Writes `body` as a single framed packet and flushes it.
    fn write_packet(
        &mut self,
        body: Bytes,
    ) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}
