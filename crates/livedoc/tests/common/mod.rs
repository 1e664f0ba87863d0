#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use livedoc::{
    DocumentError, Navigate, ResourceHandle, SessionContext, SessionObserver, SharedHandle, Toast, TransportMessage,
    WidgetError, WidgetSession, WidgetTransport,
};
use livedoc_rpc::{Message, RequestId, TransportError};
use serde_json::{json, Value};

// ── Transport ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeTransport {
    pub sent: RefCell<Vec<String>>,
    pub initial: RefCell<Option<TransportMessage>>,
    pub closed: Cell<u32>,
}

impl FakeTransport {
    pub fn with_initial(message: TransportMessage) -> Rc<Self> {
        let transport = Self::default();
        *transport.initial.borrow_mut() = Some(message);
        Rc::new(transport)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent.borrow().iter().map(|t| Message::parse(t).unwrap()).collect()
    }

    /// Requests sent so far, as `(id, method, params)`.
    pub fn requests(&self) -> Vec<(u64, String, Value)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Request { id: RequestId::Number(id), method, params } => Some((id, method, params)),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<(String, Value)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Notification { method, params } => Some((method, params)),
                _ => None,
            })
            .collect()
    }
}

impl WidgetTransport for FakeTransport {
    fn send(&self, payload: String, _references: Vec<SharedHandle>) -> Result<(), TransportError> {
        if self.closed.get() > 0 {
            return Err(TransportError::Closed);
        }
        self.sent.borrow_mut().push(payload);
        Ok(())
    }

    fn take_initial_message(&self) -> Option<TransportMessage> {
        self.initial.borrow_mut().take()
    }

    fn close(&self) {
        self.closed.set(self.closed.get() + 1);
    }
}

// ── Handles ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingHandle {
    pub closes: Cell<u32>,
}

impl ResourceHandle for CountingHandle {
    fn kind(&self) -> &str {
        "table"
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
    }
}

pub fn handles(n: usize) -> Vec<Rc<CountingHandle>> {
    (0..n).map(|_| Rc::new(CountingHandle::default())).collect()
}

pub fn shared(handles: &[Rc<CountingHandle>]) -> Vec<SharedHandle> {
    handles.iter().map(|h| h.clone() as SharedHandle).collect()
}

// ── Observer ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub data: RefCell<Vec<Value>>,
    pub toasts: RefCell<Vec<Toast>>,
    pub navigations: RefCell<Vec<Navigate>>,
    pub errors: RefCell<Vec<WidgetError>>,
}

impl SessionObserver for Recorder {
    fn data_changed(&self, state: &Value) {
        self.data.borrow_mut().push(state.clone());
    }

    fn toast(&self, toast: &Toast) {
        self.toasts.borrow_mut().push(toast.clone());
    }

    fn navigate(&self, navigate: &Navigate) {
        self.navigations.borrow_mut().push(navigate.clone());
    }

    fn protocol_error(&self, error: &WidgetError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

// ── Messages ──────────────────────────────────────────────────────────────

pub fn notification(method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "method": method, "params": params}).to_string()
}

pub fn patched(patch: Value) -> TransportMessage {
    TransportMessage::text(notification("documentPatched", json!([patch])))
}

pub fn patched_with(patch: Value, handles: &[Rc<CountingHandle>]) -> TransportMessage {
    TransportMessage::new(notification("documentPatched", json!([patch])), shared(handles))
}

pub fn patched_with_state(patch: Value, state: &str) -> TransportMessage {
    TransportMessage::text(notification("documentPatched", json!([patch, state])))
}

pub fn document_error(error: &DocumentError) -> TransportMessage {
    let payload = json!({"message": error.message, "type": error.kind, "stack": error.stack}).to_string();
    TransportMessage::text(notification("documentError", json!([payload])))
}

pub fn event(name: &str, payload: Value) -> TransportMessage {
    TransportMessage::text(notification("event", json!([name, payload.to_string()])))
}

pub fn response(id: u64, result: Value) -> TransportMessage {
    TransportMessage::text(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string())
}

// ── Sessions ──────────────────────────────────────────────────────────────

pub struct Harness {
    pub session: WidgetSession,
    pub transport: Rc<FakeTransport>,
    pub recorder: Rc<Recorder>,
}

pub async fn open_with(context: SessionContext, initial_state: Value) -> Harness {
    let transport = Rc::new(FakeTransport::default());
    let recorder = Rc::new(Recorder::default());
    let context = context.with_observer(recorder.clone());
    let session = WidgetSession::open(transport.clone(), context, initial_state).await;
    Harness { session, transport, recorder }
}

pub async fn open() -> Harness {
    open_with(SessionContext::default(), json!({})).await
}
