use bytes::Bytes;

/// The buffer a single request/response round-trip is carried in.
///
/// A real dispatcher reuses one buffer across the whole round-trip to avoid
/// an allocation on the hot path. Modeling the handoff as a sum type instead
/// of a raw pointer makes the reuse explicit: at any instant the packet is in
/// exactly one of these states, and there is no `buf` field left to
/// double-free or read after the handoff moves on.
#[derive(Debug)]
pub enum Packet {
    /// Holds the request body, on its way upstream.
    Request(Bytes),
    /// The request has been hung off the upstream queue; no buffer is owned
    /// here until the response arrives.
    Awaiting,
    /// Holds the response body, on its way back to the client.
    Response(Bytes),
}

impl Packet {
    pub fn new(request: Bytes) -> Self {
        Packet::Request(request)
    }

    /// Takes the request body, leaving the packet `Awaiting`.
    ///
    /// # Panics
    /// Panics if called on anything but `Packet::Request`. This is a
    /// programmer-contract violation the same way arming a second read on a
    /// connection would be: it cannot happen through the public API.
    pub fn take_request(&mut self) -> Bytes {
        match std::mem::replace(self, Packet::Awaiting) {
            Packet::Request(buf) => buf,
            other => panic!("take_request called on {other:?}-state packet"),
        }
    }

    /// Rebinds the packet to hold the response body.
    ///
    /// # Panics
    /// Panics if the packet isn't currently `Awaiting`.
    pub fn put_response(&mut self, response: Bytes) {
        match self {
            Packet::Awaiting => *self = Packet::Response(response),
            other => panic!("put_response called on {other:?}-state packet"),
        }
    }

    /// Takes the response body, consuming the packet.
    ///
    /// # Panics
    /// Panics if called on anything but `Packet::Response`.
    pub fn take_response(self) -> Bytes {
        match self {
            Packet::Response(buf) => buf,
            other => panic!("take_response called on {other:?}-state packet"),
        }
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Packet::Request(buf) => write!(f, "Request({} bytes)", buf.len()),
            Packet::Awaiting => write!(f, "Awaiting"),
            Packet::Response(buf) => write!(f, "Response({} bytes)", buf.len()),
        }
    }
}
