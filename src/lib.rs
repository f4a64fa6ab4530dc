//! `reqmux`: a single-hop, single-upstream async request multiplexer.
//!
//! Accepts many client connections, forwards every framed request to one
//! upstream target over a multiplexed request/response channel (see
//! [`upstream::UpstreamQueue`]), and writes each response back to the
//! connection it came from.

mod conn;
mod listener;

pub mod codec;
pub mod config;
pub mod error;
pub mod packet;
pub mod upstream;

mod dispatcher;

pub use config::DispatcherConfig;
pub use dispatcher::{ConnHandle, Dispatcher};
pub use error::{Error, Result};
pub use packet::Packet;
