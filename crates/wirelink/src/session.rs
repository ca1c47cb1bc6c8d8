//! RpcSession: the call engine and inbound dispatcher for one connection.
//!
//! # Key invariant
//!
//! Only [`RpcSession::run`] calls `transport.recv()`. Callers issue
//! [`RpcSession::call`] concurrently from any task; the demux loop routes
//! every inbound frame through the pending table or the event subscriber,
//! so callers and the dispatcher never compete for the stream.
//!
//! # Usage
//!
//! ```ignore
//! let session = Arc::new(RpcSession::new(transport));
//! tokio::spawn(session.clone().run());
//!
//! session.on_event(|name, params| println!("{name}: {params}"));
//!
//! let request = session.create_request("contacts.get", json!({}));
//! let contacts: Vec<Contact> = session.call(request, Duration::from_secs(10)).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    CallError, CallOutcome, EnvelopeCodec, IdAllocator, InboundMessage, PendingTable, Request,
    Transport, TransportError, DEFAULT_ID_CEILING, PROTOCOL_VERSION,
};

/// Subscriber callback for push events, invoked with `(name, params)`.
pub type EventHandler = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// Session tunables.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Version tag expected on every envelope.
    pub protocol_version: u8,
    /// Highest id the allocator emits before wrapping back to 1.
    pub id_ceiling: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            id_ceiling: DEFAULT_ID_CEILING,
        }
    }
}

/// One RPC session over one transport.
///
/// All mutable state (id counter, pending table, event subscriber) is owned
/// by the instance; independent sessions never share anything.
pub struct RpcSession {
    transport: Transport,
    codec: EnvelopeCodec,
    ids: IdAllocator,
    pending: PendingTable,
    event_handler: Mutex<Option<EventHandler>>,
}

/// Removes the pending entry if the call unwinds before it is resolved
/// (timeout, send failure, caller cancellation).
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: u64,
    active: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.active = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.active && self.pending.remove(self.id) {
            tracing::debug!(id = self.id, "call abandoned: removed pending entry");
        }
    }
}

impl RpcSession {
    pub fn new(transport: Transport) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: Transport, config: SessionConfig) -> Self {
        Self {
            transport,
            codec: EnvelopeCodec::new(config.protocol_version),
            ids: IdAllocator::new(config.id_ceiling),
            pending: PendingTable::new(),
            event_handler: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Ids of calls still awaiting a response (diagnostics).
    pub fn pending_ids(&self) -> Vec<u64> {
        self.pending.ids()
    }

    /// Build a request for `method` with a freshly allocated id.
    pub fn create_request(&self, method: impl Into<String>, params: Value) -> Request {
        Request::new(method, params, self.ids.next())
    }

    /// Register the subscriber for push events, replacing any previous one.
    ///
    /// Delivery is at-most-once per inbound frame and unbuffered; events
    /// arriving while no subscriber is registered are dropped.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        *self.event_handler.lock() = Some(Box::new(handler));
    }

    /// Send a request and suspend up to `timeout` for its response.
    ///
    /// Resolves exactly once: to the decoded result, or to one failure from
    /// [`CallError`]. The pending entry is removed on every exit path.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<T, CallError> {
        let id = request.id;
        let bytes = self
            .codec
            .encode_request(&request)
            .map_err(CallError::Serialize)?;

        // Register before sending so a fast response can never race past
        // its waiter.
        let rx = self
            .pending
            .register(id)
            .map_err(|e| CallError::Internal(e.to_string()))?;
        let mut guard = PendingGuard {
            pending: &self.pending,
            id,
            active: true,
        };

        self.transport
            .send(bytes)
            .await
            .map_err(CallError::Transport)?;
        tracing::debug!(id, method = %request.method, "request sent");

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Sender dropped without completing; the entry is already gone.
                guard.disarm();
                return Err(CallError::Transport(TransportError::Closed));
            }
            Err(_elapsed) => {
                tracing::warn!(
                    id,
                    method = %request.method,
                    timeout_ms = timeout.as_millis() as u64,
                    "call timed out waiting for response"
                );
                // The guard removes the entry; a response arriving after
                // this point hits the table's silent-drop path.
                return Err(CallError::Timeout);
            }
        };
        guard.disarm();

        match outcome {
            CallOutcome::Result(value) => {
                serde_json::from_value(value).map_err(CallError::Deserialize)
            }
            CallOutcome::Error(error) => Err(CallError::Rpc(error)),
            CallOutcome::Closed => Err(CallError::Transport(TransportError::Closed)),
        }
    }

    /// Send a fire-and-forget notification: a request with no id, expecting
    /// no response.
    pub async fn notify(&self, method: &str, params: &Value) -> Result<(), CallError> {
        let bytes = self
            .codec
            .encode_notification(method, params)
            .map_err(CallError::Serialize)?;
        self.transport
            .send(bytes)
            .await
            .map_err(CallError::Transport)
    }

    /// Process one inbound frame.
    ///
    /// Malformed and version-mismatched frames are discarded here. Nothing
    /// on this path fails upward: a bad frame, a late response, or an
    /// unsubscribed event only affects logging.
    pub fn handle_frame(&self, bytes: &[u8]) {
        match self.codec.decode(bytes) {
            InboundMessage::Result { id, result } => {
                if !self.pending.complete(id, CallOutcome::Result(result)) {
                    tracing::warn!(id, "unmatched result response dropped");
                }
            }
            InboundMessage::Error { id, error } => {
                tracing::debug!(id, code = error.code, message = %error.message, "error response");
                if !self.pending.complete(id, CallOutcome::Error(error)) {
                    tracing::warn!(id, "unmatched error response dropped");
                }
            }
            InboundMessage::Event { name, params } => {
                let handler = self.event_handler.lock();
                match handler.as_ref() {
                    Some(handler) => handler(&name, &params),
                    None => tracing::warn!(event = %name, "push event dropped: no subscriber"),
                }
            }
            InboundMessage::Malformed => {
                tracing::trace!(len = bytes.len(), "discarded malformed frame");
            }
        }
    }

    /// Run the demux loop until the transport closes.
    ///
    /// On closure every still-pending call is cancelled with a closed
    /// outcome; a transport error does the same and is then returned.
    pub async fn run(self: Arc<Self>) -> Result<(), TransportError> {
        tracing::debug!("session demux loop started");
        loop {
            match self.transport.recv().await {
                Ok(frame) => self.handle_frame(&frame),
                Err(TransportError::Closed) => {
                    tracing::debug!("transport closed");
                    self.pending.cancel_all();
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "transport error");
                    self.pending.cancel_all();
                    return Err(e);
                }
            }
        }
    }

    /// Close the transport and wake every pending caller with a closed
    /// outcome.
    pub fn close(&self) {
        self.transport.close();
        self.pending.cancel_all();
    }
}
