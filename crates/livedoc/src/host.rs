//! Widget replacement across transports.

use std::cell::RefCell;
use std::rc::Rc;

use livedoc_rpc::PendingCall;
use serde_json::Value;
use tracing::debug;

use crate::error::WidgetError;
use crate::events::{Navigate, Toast};
use crate::options::{SessionContext, SessionObserver};
use crate::session::{WidgetSession, WidgetTransport, WIDGET_CHANGED};

/// Owns at most one live session and the latest externally known view
/// state. Attaching a new transport replaces the session; the new one starts
/// from the latest state, not from whatever the old session held.
pub struct WidgetHost {
    context: SessionContext,
    latest_state: Rc<RefCell<Value>>,
    session: Option<WidgetSession>,
}

impl WidgetHost {
    pub fn new(context: SessionContext, initial_state: Value) -> Self {
        Self { context, latest_state: Rc::new(RefCell::new(initial_state)), session: None }
    }

    pub async fn attach(&mut self, transport: Rc<dyn WidgetTransport>) -> WidgetSession {
        if let Some(old) = self.session.take() {
            debug!("replacing widget session");
            old.close_with_reason(WIDGET_CHANGED);
        }
        let recorder = StateRecorder { latest: self.latest_state.clone(), inner: self.context.observer.clone() };
        let context = self.context.clone().with_observer(Rc::new(recorder));
        let state = self.latest_state.borrow().clone();
        let session = WidgetSession::open(transport, context, state).await;
        self.session = Some(session.clone());
        session
    }

    /// Record `state` and forward it to the live session, if any.
    pub fn set_state(&self, state: Value) -> Option<PendingCall> {
        *self.latest_state.borrow_mut() = state.clone();
        self.session.as_ref().map(|s| s.set_state(state))
    }

    pub fn latest_state(&self) -> Value {
        self.latest_state.borrow().clone()
    }

    pub fn session(&self) -> Option<&WidgetSession> {
        self.session.as_ref()
    }

    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

/// Keeps the host's view state in step with what sessions report.
struct StateRecorder {
    latest: Rc<RefCell<Value>>,
    inner: Rc<dyn SessionObserver>,
}

impl SessionObserver for StateRecorder {
    fn data_changed(&self, state: &Value) {
        *self.latest.borrow_mut() = state.clone();
        self.inner.data_changed(state);
    }

    fn toast(&self, toast: &Toast) {
        self.inner.toast(toast);
    }

    fn navigate(&self, navigate: &Navigate) {
        self.inner.navigate(navigate);
    }

    fn protocol_error(&self, error: &WidgetError) {
        self.inner.protocol_error(error);
    }
}
