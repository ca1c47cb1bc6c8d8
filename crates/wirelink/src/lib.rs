//! wirelink: request/response correlation over a single duplex byte stream.
//!
//! This crate turns an already-open bidirectional transport into a call-style
//! RPC abstraction: callers issue named JSON-RPC 2.0 calls and suspend until
//! a typed result, a server error, or a timeout; the same stream may at any
//! time deliver unsolicited push events to a subscriber.
//!
//! The pieces:
//! - Envelope framing and classification ([`EnvelopeCodec`], [`InboundMessage`])
//! - Request id allocation with atomic wraparound ([`IdAllocator`])
//! - The pending-call table ([`PendingTable`], [`CallOutcome`])
//! - The call engine and inbound dispatcher ([`RpcSession`])
//! - The transport seam ([`Transport`], [`TransportError`])
//!
//! One engine instance owns one connection; nothing here is global, so any
//! number of independent sessions can coexist in a process.

mod envelope;
mod error;
mod id;
mod pending;
mod session;
mod transport;

pub use envelope::*;
pub use error::*;
pub use id::*;
pub use pending::*;
pub use session::*;
pub use transport::*;
