//! One widget instance: its transport, channel, document state and
//! reference tables.
//!
//! All inbound work for a message (patch, hydrate, commit) runs to
//! completion inside [`WidgetSession::receive`] before the next message is
//! looked at. Observers see one snapshot per committed transition.

use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use livedoc_patch::{apply_patch, from_json_patch, Doc};
use livedoc_rpc::{PendingCall, RpcChannel, RpcError, TransportError};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{DocumentError, ProtocolError, StateParseError, WidgetError};
use crate::events::dispatch_event;
use crate::hydrate::{hydrate, HydrateEnv};
use crate::hydrated::Hydrated;
use crate::options::SessionContext;
use crate::payload::decode_payload;
use crate::refs::ReferenceTables;
use crate::resource::SharedHandle;

pub const DOCUMENT_PATCHED: &str = "documentPatched";
pub const DOCUMENT_ERROR: &str = "documentError";
pub const EVENT: &str = "event";
pub const SET_STATE: &str = "setState";

/// Rejection reason for calls that were pending when a widget was replaced.
pub const WIDGET_CHANGED: &str = "widget changed";

const INBOUND_METHODS: [&str; 3] = [DOCUMENT_PATCHED, DOCUMENT_ERROR, EVENT];

// ── Transport ─────────────────────────────────────────────────────────────

/// One transport unit: a JSON-RPC envelope plus the handles delivered
/// alongside it, in order.
pub struct TransportMessage {
    pub payload: String,
    pub handles: Vec<SharedHandle>,
}

impl TransportMessage {
    pub fn new(payload: impl Into<String>, handles: Vec<SharedHandle>) -> Self {
        Self { payload: payload.into(), handles }
    }

    pub fn text(payload: impl Into<String>) -> Self {
        Self::new(payload, Vec::new())
    }
}

impl fmt::Debug for TransportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportMessage")
            .field("payload", &self.payload)
            .field("handles", &self.handles.len())
            .finish()
    }
}

/// The widget's connection to the server.
pub trait WidgetTransport {
    fn send(&self, payload: String, references: Vec<SharedHandle>) -> Result<(), TransportError>;

    /// The payload buffered before the session attached, if any.
    fn take_initial_message(&self) -> Option<TransportMessage> {
        None
    }

    fn close(&self);
}

// ── Snapshots ─────────────────────────────────────────────────────────────

/// Re-sends the latest state and puts the session back into loading.
#[derive(Clone)]
pub struct ReloadAction(Weak<SessionInner>);

impl ReloadAction {
    /// `None` once the session is gone.
    pub fn reload(&self) -> Option<PendingCall> {
        let inner = self.0.upgrade()?;
        if inner.torn_down.get() {
            return None;
        }
        Some(inner.reload())
    }
}

impl fmt::Debug for ReloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReloadAction")
    }
}

#[derive(Debug, Clone)]
pub struct ErrorState {
    pub error: DocumentError,
    pub reload: ReloadAction,
}

#[derive(Debug, Clone)]
pub enum Status {
    Loading,
    Ready,
    Error(ErrorState),
    TornDown,
}

/// What the presentation layer renders.
///
/// `raw` is always the server's document as of the last applied patch.
/// `hydrated` is the last successful hydration, which lags behind `raw`
/// when a hydration pass failed.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub raw: Doc,
    pub hydrated: Hydrated,
    pub status: Status,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, Status::Loading)
    }

    pub fn error(&self) -> Option<&DocumentError> {
        match &self.status {
            Status::Error(state) => Some(&state.error),
            _ => None,
        }
    }

    pub fn reload_action(&self) -> Option<&ReloadAction> {
        match &self.status {
            Status::Error(state) => Some(&state.reload),
            _ => None,
        }
    }
}

pub type ListenerId = u64;
type Listener = Rc<dyn Fn(&SessionSnapshot)>;

struct DocState {
    raw: Doc,
    hydrated: Hydrated,
    status: Status,
}

impl DocState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            raw: self.raw.clone(),
            hydrated: self.hydrated.clone(),
            status: self.status.clone(),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────

struct SessionInner {
    me: Weak<SessionInner>,
    transport: Rc<dyn WidgetTransport>,
    channel: RpcChannel,
    context: SessionContext,
    doc: RefCell<DocState>,
    tables: RefCell<ReferenceTables>,
    /// Handles of the message currently being dispatched.
    inbound: RefCell<BTreeMap<u64, SharedHandle>>,
    latest_state: RefCell<Value>,
    listeners: RefCell<BTreeMap<ListenerId, Listener>>,
    next_listener: Cell<ListenerId>,
    torn_down: Cell<bool>,
}

/// Cloning shares the session. The last clone to drop tears it down.
#[derive(Clone)]
pub struct WidgetSession(Rc<SessionInner>);

type Handler = fn(&SessionInner, Value) -> Result<(), WidgetError>;

impl WidgetSession {
    /// Start a session on `transport`: register the inbound methods, send
    /// `setState(initial_state)` and process the transport's buffered
    /// initial message.
    ///
    /// The `setState` acknowledgement is not awaited. A `documentError` or
    /// several patches may arrive first.
    pub async fn open(transport: Rc<dyn WidgetTransport>, context: SessionContext, initial_state: Value) -> Self {
        let outbound = transport.clone();
        let channel = RpcChannel::new(move |text: String| outbound.send(text, Vec::new()));
        let inner = Rc::new_cyclic(|me| SessionInner {
            me: me.clone(),
            transport,
            channel,
            context,
            doc: RefCell::new(DocState { raw: Doc::empty_object(), hydrated: Hydrated::Null, status: Status::Loading }),
            tables: RefCell::new(ReferenceTables::default()),
            inbound: RefCell::new(BTreeMap::new()),
            latest_state: RefCell::new(Value::Null),
            listeners: RefCell::new(BTreeMap::new()),
            next_listener: Cell::new(0),
            torn_down: Cell::new(false),
        });
        inner.register_methods();
        let session = WidgetSession(inner);
        debug!("widget session opened");

        drop(session.set_state(initial_state));
        if let Some(message) = session.0.transport.take_initial_message() {
            session.receive(message).await;
        }
        session
    }

    /// Process one transport message.
    ///
    /// Handles delivered with the message get their session-wide ids first.
    /// Any the message did not adopt are closed before this returns.
    pub async fn receive(&self, message: TransportMessage) {
        let inner = &self.0;
        if inner.torn_down.get() {
            debug!("dropping message received after teardown");
            message.handles.iter().for_each(|h| h.close());
            return;
        }
        let delivered = inner.tables.borrow_mut().register_delivered(message.handles);
        *inner.inbound.borrow_mut() = delivered;

        inner.channel.receive(&message.payload).await;

        for (id, handle) in inner.inbound.take() {
            debug!(id, "closing handle the message did not use");
            handle.close();
        }
    }

    /// Process messages in order until the stream ends or the session is
    /// torn down.
    pub async fn listen<S>(&self, mut messages: S)
    where
        S: Stream<Item = TransportMessage> + Unpin,
    {
        while !self.0.torn_down.get() {
            match messages.next().await {
                Some(message) => self.receive(message).await,
                None => break,
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.0.doc.borrow().snapshot()
    }

    pub fn tables(&self) -> Ref<'_, ReferenceTables> {
        self.0.tables.borrow()
    }

    /// Call `listener` after every committed transition.
    pub fn on_change(&self, listener: impl Fn(&SessionSnapshot) + 'static) -> ListenerId {
        let id = self.0.next_listener.get();
        self.0.next_listener.set(id + 1);
        self.0.listeners.borrow_mut().insert(id, Rc::new(listener));
        id
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.0.listeners.borrow_mut().remove(&id).is_some()
    }

    /// Send view state to the server. It is also what a reload re-sends.
    pub fn set_state(&self, state: Value) -> PendingCall {
        *self.0.latest_state.borrow_mut() = state.clone();
        self.0.channel.call(SET_STATE, json!([state]))
    }

    pub fn latest_state(&self) -> Value {
        self.0.latest_state.borrow().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.torn_down.get()
    }

    pub fn close(&self) {
        self.0.teardown("session closed");
    }

    /// Tear down, rejecting pending calls with `reason`.
    pub fn close_with_reason(&self, reason: &str) {
        self.0.teardown(reason);
    }
}

impl fmt::Debug for WidgetSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetSession")
            .field("status", &self.0.doc.borrow().status)
            .field("pending", &self.0.channel.pending_count())
            .finish()
    }
}

impl SessionInner {
    fn register_methods(&self) {
        let handlers: [(&'static str, Handler); 3] = [
            (DOCUMENT_PATCHED, SessionInner::document_patched),
            (DOCUMENT_ERROR, SessionInner::document_error),
            (EVENT, SessionInner::event),
        ];
        for (name, handler) in handlers {
            let me = self.me.clone();
            self.channel.register_method(name, move |params| {
                let outcome = match me.upgrade() {
                    Some(inner) => inner.handle(name, handler, params),
                    None => Err(RpcError::from(WidgetError::Closed)),
                };
                future::ready(outcome)
            });
        }
    }

    fn handle(&self, method: &'static str, handler: Handler, params: Value) -> Result<Value, RpcError> {
        if self.torn_down.get() {
            return Err(WidgetError::Closed.into());
        }
        match handler(self, params) {
            Ok(()) => Ok(Value::Null),
            Err(err) => {
                warn!(method, error = %err, "inbound message rejected");
                self.context.observer.protocol_error(&err);
                Err(err.into())
            }
        }
    }

    fn document_patched(&self, params: Value) -> Result<(), WidgetError> {
        let mut args = Args::new(DOCUMENT_PATCHED, params)?;
        let ops = from_json_patch(&args.required("patch")?)?;
        let state = args.optional();

        let next = apply_patch(&self.doc.borrow().raw, &ops)?;
        let in_error = matches!(self.doc.borrow().status, Status::Error(_));
        let env = HydrateEnv {
            channel: &self.channel,
            factory: &*self.context.factory,
            resolver: &*self.context.resolver,
            tolerate_missing_handles: in_error && self.context.options.tolerate_missing_handles_on_error,
            dispose_callables: self.context.options.dispose_callables,
        };
        let delivered = self.inbound.take();
        let hydrated = match hydrate(&next, delivered, &mut self.tables.borrow_mut(), &env) {
            Ok(hydrated) => hydrated,
            Err(err) => {
                // The server has moved on. Later patches apply to `next` while
                // the view stays at the last good hydration.
                self.commit(|doc| doc.raw = next);
                return Err(err.into());
            }
        };

        self.commit(|doc| {
            doc.raw = next;
            doc.hydrated = hydrated;
            doc.status = Status::Ready;
        });

        match state {
            None => {}
            Some(Value::String(text)) => self.forward_state(&text),
            Some(other) => warn!(%other, "state snapshot is not a string, not forwarded"),
        }
        Ok(())
    }

    fn forward_state(&self, text: &str) {
        match serde_json::from_str::<Value>(text).map_err(StateParseError::from) {
            Ok(state) => {
                *self.latest_state.borrow_mut() = state.clone();
                self.context.observer.data_changed(&state);
            }
            Err(err) => warn!(error = %err, "state snapshot not forwarded"),
        }
    }

    fn document_error(&self, params: Value) -> Result<(), WidgetError> {
        let mut args = Args::new(DOCUMENT_ERROR, params)?;
        let error = DocumentError::parse(&args.string("payload")?);
        warn!(message = %error.message, kind = ?error.kind, "server reported a document error");
        let reload = ReloadAction(self.me.clone());
        self.commit(|doc| doc.status = Status::Error(ErrorState { error, reload }));
        Ok(())
    }

    fn event(&self, params: Value) -> Result<(), WidgetError> {
        let mut args = Args::new(EVENT, params)?;
        let name = args.string("name")?;
        let payload = decode_payload(&args.string("payload")?, &self.channel)?;
        debug!(%name, "event");
        dispatch_event(&name, payload, &*self.context.observer)?;
        Ok(())
    }

    fn reload(&self) -> PendingCall {
        debug!("reloading after document error");
        self.commit(|doc| doc.status = Status::Loading);
        let state = self.latest_state.borrow().clone();
        self.channel.call(SET_STATE, json!([state]))
    }

    fn commit(&self, update: impl FnOnce(&mut DocState)) {
        let snapshot = {
            let mut doc = self.doc.borrow_mut();
            update(&mut doc);
            doc.snapshot()
        };
        let listeners: Vec<Listener> = self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn teardown(&self, reason: &str) {
        if self.torn_down.replace(true) {
            return;
        }
        debug!(reason, "tearing down widget session");
        for name in INBOUND_METHODS {
            self.channel.unregister_method(name);
        }
        self.channel.close(reason);
        for handle in self.inbound.take().into_values() {
            handle.close();
        }
        self.tables.borrow_mut().release_all();
        self.transport.close();
        self.commit(|doc| doc.status = Status::TornDown);
        self.listeners.borrow_mut().clear();
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.teardown("session dropped");
    }
}

// ── Params ────────────────────────────────────────────────────────────────

struct Args {
    method: &'static str,
    items: std::vec::IntoIter<Value>,
}

impl Args {
    fn new(method: &'static str, params: Value) -> Result<Self, ProtocolError> {
        let items = match params {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => return Err(invalid(method, format!("expected positional params, got {other}"))),
        };
        Ok(Self { method, items: items.into_iter() })
    }

    fn required(&mut self, what: &str) -> Result<Value, ProtocolError> {
        self.items.next().ok_or_else(|| invalid(self.method, format!("missing {what}")))
    }

    fn optional(&mut self) -> Option<Value> {
        self.items.next().filter(|v| !v.is_null())
    }

    fn string(&mut self, what: &str) -> Result<String, ProtocolError> {
        match self.required(what)? {
            Value::String(s) => Ok(s),
            other => Err(invalid(self.method, format!("{what} must be a string, got {other}"))),
        }
    }
}

fn invalid(method: &'static str, reason: String) -> ProtocolError {
    ProtocolError::InvalidParams { method, reason }
}
