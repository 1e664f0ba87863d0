//! Server-initiated side effects delivered through the `event` method.

use crate::callable::Callable;
use crate::error::ProtocolError;
use crate::hydrated::Hydrated;
use crate::options::SessionObserver;

pub const TOAST: &str = "toast";
pub const NAVIGATE: &str = "navigate";

/// Names the registry understands.
pub const EVENTS: [&str; 2] = [TOAST, NAVIGATE];

/// A transient notification.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub variant: Option<String>,
    /// Display time in milliseconds.
    pub timeout: Option<u64>,
    pub action: Option<Callable>,
}

#[derive(Debug, Clone)]
pub struct Navigate {
    pub uri: Option<String>,
    pub params: Hydrated,
}

pub fn dispatch_event(name: &str, payload: Hydrated, observer: &dyn SessionObserver) -> Result<(), ProtocolError> {
    match name {
        TOAST => observer.toast(&Toast::from_payload(&payload)?),
        NAVIGATE => observer.navigate(&Navigate::from_payload(payload)),
        other => return Err(ProtocolError::UnknownEvent(other.to_string())),
    }
    Ok(())
}

impl Toast {
    fn from_payload(payload: &Hydrated) -> Result<Self, ProtocolError> {
        let message = payload.get("message").and_then(Hydrated::as_str).ok_or_else(|| ProtocolError::InvalidParams {
            method: "event",
            reason: "toast without a message".into(),
        })?;
        Ok(Toast {
            message: message.to_string(),
            variant: payload.get("variant").and_then(Hydrated::as_str).map(str::to_string),
            timeout: payload.get("timeout").and_then(Hydrated::as_u64),
            action: payload.get("action").and_then(Hydrated::as_callable).cloned(),
        })
    }
}

impl Navigate {
    fn from_payload(payload: Hydrated) -> Self {
        Navigate {
            uri: payload.get("uri").and_then(Hydrated::as_str).map(str::to_string),
            params: payload.get("params").cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode_payload;
    use livedoc_rpc::{RpcChannel, TransportError};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        toasts: RefCell<Vec<Toast>>,
        navigations: RefCell<Vec<Navigate>>,
    }

    impl SessionObserver for Recorder {
        fn toast(&self, toast: &Toast) {
            self.toasts.borrow_mut().push(toast.clone());
        }

        fn navigate(&self, navigate: &Navigate) {
            self.navigations.borrow_mut().push(navigate.clone());
        }
    }

    fn decode(text: &str) -> Hydrated {
        let channel = RpcChannel::new(|_: String| -> Result<(), TransportError> { Ok(()) });
        decode_payload(text, &channel).unwrap()
    }

    #[test]
    fn toast_carries_its_fields_and_action() {
        let recorder = Recorder::default();
        let payload = decode(r#"{"message":"Saved","variant":"positive","timeout":3000,"action":{"__cbid":"undo"}}"#);
        dispatch_event(TOAST, payload, &recorder).unwrap();

        let toasts = recorder.toasts.borrow();
        assert_eq!(toasts[0].message, "Saved");
        assert_eq!(toasts[0].variant.as_deref(), Some("positive"));
        assert_eq!(toasts[0].timeout, Some(3000));
        assert_eq!(toasts[0].action.as_ref().map(Callable::id), Some("undo"));
    }

    #[test]
    fn navigate_params_are_optional() {
        let recorder = Recorder::default();
        dispatch_event(NAVIGATE, decode(r#"{"uri":"dh://other"}"#), &recorder).unwrap();
        let navs = recorder.navigations.borrow();
        assert_eq!(navs[0].uri.as_deref(), Some("dh://other"));
        assert!(matches!(navs[0].params, Hydrated::Null));
    }

    #[test]
    fn unknown_and_malformed_events_are_rejected() {
        let recorder = Recorder::default();
        assert_eq!(
            dispatch_event("explode", Hydrated::Null, &recorder).unwrap_err(),
            ProtocolError::UnknownEvent("explode".into())
        );
        assert!(matches!(
            dispatch_event(TOAST, decode(r#"{"variant":"negative"}"#), &recorder),
            Err(ProtocolError::InvalidParams { method: "event", .. })
        ));
        assert!(recorder.toasts.borrow().is_empty());
    }
}
