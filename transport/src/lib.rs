//! Authenticated request/response transport between the validator and
//! miners.
//!
//! The transport owns three concerns: framing bytes on the wire, issuing
//! a request with a hard deadline, and admitting responses against the
//! table of outstanding nonces. Response admission is where spoofed and
//! stale replies are stopped; nothing past this layer sees an
//! unauthenticated response.

pub mod client;
pub mod error;
pub mod framing;
pub mod outstanding;

pub use client::{MinerTransport, TcpTransport};
pub use error::TransportError;
pub use framing::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use outstanding::{OutstandingRequests, PendingRequest};
