//! Transport enum and backends.
//!
//! The engine needs exactly two things from a transport: "send these bytes
//! as one frame" and "give me the next inbound frame". Connection
//! establishment, TLS, keep-alive and reconnection belong to whoever
//! constructs the transport, not to this crate.
//!
//! The public API is the [`Transport`] enum; each backend lives in its own
//! module under `transport/`.

use crate::TransportError;

pub use mem::MemTransport;
pub use stream::StreamTransport;

#[derive(Clone, Debug)]
pub enum Transport {
    /// In-process frame channels; the semantic reference used by tests.
    Mem(MemTransport),
    /// Length-prefixed frames over any `AsyncRead + AsyncWrite` stream.
    Stream(StreamTransport),
}

impl Transport {
    pub async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        match self {
            Transport::Mem(t) => t.send(frame).await,
            Transport::Stream(t) => t.send(frame).await,
        }
    }

    pub async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        match self {
            Transport::Mem(t) => t.recv().await,
            Transport::Stream(t) => t.recv().await,
        }
    }

    pub fn close(&self) {
        match self {
            Transport::Mem(t) => t.close(),
            Transport::Stream(t) => t.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Transport::Mem(t) => t.is_closed(),
            Transport::Stream(t) => t.is_closed(),
        }
    }

    pub fn mem_pair() -> (Self, Self) {
        let (a, b) = MemTransport::pair();
        (Transport::Mem(a), Transport::Mem(b))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Sync + 'static,
    {
        Transport::Stream(StreamTransport::new(stream))
    }

    pub fn stream_pair() -> (Self, Self) {
        let (a, b) = StreamTransport::pair();
        (Transport::Stream(a), Transport::Stream(b))
    }
}

pub mod mem;
pub mod stream;
