//! Duplex method multiplexer over one ordered transport.
//!
//! Inbound requests and notifications are dispatched to registered methods.
//! Outbound calls get a fresh numeric id and a pending entry that is
//! completed by the response carrying the same id, whatever order responses
//! arrive in.
//!
//! The channel is single-threaded. Feed it with [`RpcChannel::receive`] one
//! message at a time, in transport order.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_channel::oneshot;
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::message::{Message, RequestId, RpcError};

pub type MethodFuture = LocalBoxFuture<'static, Result<Value, RpcError>>;
pub type Method = Rc<dyn Fn(Value) -> MethodFuture>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Why an outbound call did not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("remote error: {0}")]
    Remote(#[from] RpcError),
    #[error("call rejected: {0}")]
    Rejected(String),
    #[error("channel dropped before the call completed")]
    Dropped,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Where encoded envelopes go.
pub trait Outbound {
    fn send(&self, payload: String) -> Result<(), TransportError>;
}

impl<F> Outbound for F
where
    F: Fn(String) -> Result<(), TransportError>,
{
    fn send(&self, payload: String) -> Result<(), TransportError> {
        self(payload)
    }
}

type Completion = oneshot::Sender<Result<Value, CallError>>;

struct Inner {
    outbound: Box<dyn Outbound>,
    methods: RefCell<HashMap<String, Method>>,
    pending: RefCell<HashMap<u64, Completion>>,
    next_id: Cell<u64>,
    /// Set by [`RpcChannel::close`]; later calls fail with this reason.
    closed: RefCell<Option<String>>,
}

/// Cloning shares the channel.
#[derive(Clone)]
pub struct RpcChannel {
    inner: Rc<Inner>,
}

impl RpcChannel {
    pub fn new(outbound: impl Outbound + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                outbound: Box::new(outbound),
                methods: RefCell::new(HashMap::new()),
                pending: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
                closed: RefCell::new(None),
            }),
        }
    }

    /// Install the handler for inbound `name`. Replaces any previous handler.
    ///
    /// The handler's result is sent back when the inbound message was a
    /// request and dropped when it was a notification. Handlers must not
    /// await a response on this same channel: the caller of `receive` is the
    /// only thing that delivers responses.
    pub fn register_method<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + 'static,
    {
        let method: Method = Rc::new(move |params| handler(params).boxed_local());
        self.inner.methods.borrow_mut().insert(name.into(), method);
    }

    pub fn unregister_method(&self, name: &str) -> bool {
        self.inner.methods.borrow_mut().remove(name).is_some()
    }

    /// Send a request and return a future for its response.
    ///
    /// On a closed channel nothing is sent and the call is already rejected.
    pub fn call(&self, method: &str, params: Value) -> PendingCall {
        if let Some(reason) = self.inner.closed.borrow().clone() {
            debug!(method, reason = %reason, "call on closed channel");
            return PendingCall(State::Failed(Some(CallError::Rejected(reason))));
        }
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let (tx, rx) = oneshot::channel();
        self.inner.pending.borrow_mut().insert(id, tx);

        let text = Message::request(RequestId::Number(id), method, params).to_text();
        trace!(id, method, "sending request");
        if let Err(err) = self.inner.outbound.send(text) {
            self.inner.pending.borrow_mut().remove(&id);
            warn!(id, method, error = %err, "request not sent");
            return PendingCall(State::Failed(Some(CallError::Transport(err))));
        }
        PendingCall(State::Waiting(rx))
    }

    /// Send a notification. No response is expected.
    pub fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        trace!(method, "sending notification");
        self.inner.outbound.send(Message::notification(method, params).to_text())
    }

    /// Process one inbound transport message.
    ///
    /// Malformed messages are logged and dropped; they never poison the
    /// channel.
    pub async fn receive(&self, text: &str) {
        let message = match Message::parse(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "dropping malformed message");
                return;
            }
        };
        match message {
            Message::Response { id, outcome } => self.complete(id, outcome),
            Message::Notification { method, params } => match self.dispatch(&method, params) {
                Some(reply) => {
                    if let Err(err) = reply.await {
                        warn!(%method, error = %err, "notification handler failed");
                    }
                }
                None => warn!(%method, "notification for unknown method"),
            },
            Message::Request { id, method, params } => {
                let outcome = match self.dispatch(&method, params) {
                    Some(reply) => reply.await,
                    None => {
                        warn!(%method, "request for unknown method");
                        Err(RpcError::method_not_found(&method))
                    }
                };
                if let Err(err) = &outcome {
                    debug!(%id, %method, error = %err, "answering request with error");
                }
                let text = Message::Response { id, outcome }.to_text();
                if let Err(err) = self.inner.outbound.send(text) {
                    warn!(error = %err, "response not sent");
                }
            }
        }
    }

    /// Complete every pending call with `CallError::Rejected(reason)`.
    pub fn reject_all(&self, reason: &str) {
        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if !pending.is_empty() {
            debug!(count = pending.len(), reason, "rejecting pending calls");
        }
        for (_, tx) in pending {
            let _ = tx.send(Err(CallError::Rejected(reason.to_string())));
        }
    }

    /// Reject every pending call with `reason` and every later call too.
    pub fn close(&self, reason: &str) {
        self.inner.closed.replace(Some(reason.to_string()));
        self.reject_all(reason);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.borrow().is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    fn dispatch(&self, method: &str, params: Value) -> Option<MethodFuture> {
        let handler = self.inner.methods.borrow().get(method).cloned()?;
        Some(handler(params))
    }

    fn complete(&self, id: RequestId, outcome: Result<Value, RpcError>) {
        let RequestId::Number(n) = id else {
            warn!(%id, "response with foreign id");
            return;
        };
        let Some(tx) = self.inner.pending.borrow_mut().remove(&n) else {
            debug!(id = n, "response for unknown or settled call");
            return;
        };
        trace!(id = n, ok = outcome.is_ok(), "response received");
        // The caller may have dropped its future; that is not an error here.
        let _ = tx.send(outcome.map_err(CallError::Remote));
    }
}

enum State {
    Waiting(oneshot::Receiver<Result<Value, CallError>>),
    Failed(Option<CallError>),
}

/// Future returned by [`RpcChannel::call`].
pub struct PendingCall(State);

impl Future for PendingCall {
    type Output = Result<Value, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_canceled)) => Poll::Ready(Err(CallError::Dropped)),
                Poll::Pending => Poll::Pending,
            },
            State::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(CallError::Dropped))),
        }
    }
}
