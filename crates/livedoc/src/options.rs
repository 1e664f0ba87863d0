//! Session configuration and the host-facing collaborator bundle.

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::WidgetError;
use crate::events::{Navigate, Toast};
use crate::resource::{ElementFactory, NoUriResolver, PlainElements, UriResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Notify the server with `disposeCallable` when a callable id drops out
    /// of the document.
    pub dispose_callables: bool,
    /// While a document error is held, render undelivered exported objects
    /// as `null` rather than rejecting the update.
    pub tolerate_missing_handles_on_error: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dispose_callables: false,
            tolerate_missing_handles_on_error: true,
        }
    }
}

/// Upstream notifications from a session. Every method defaults to a no-op.
pub trait SessionObserver {
    /// A patch arrived with a persisted view-state snapshot.
    fn data_changed(&self, _state: &Value) {}

    fn toast(&self, _toast: &Toast) {}

    fn navigate(&self, _navigate: &Navigate) {}

    /// An inbound message was rejected. The committed state is unchanged.
    fn protocol_error(&self, _error: &WidgetError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Everything a session needs from its host besides the transport.
#[derive(Clone)]
pub struct SessionContext {
    pub factory: Rc<dyn ElementFactory>,
    pub resolver: Rc<dyn UriResolver>,
    pub observer: Rc<dyn SessionObserver>,
    pub options: SessionOptions,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            factory: Rc::new(PlainElements),
            resolver: Rc::new(NoUriResolver),
            observer: Rc::new(NoopObserver),
            options: SessionOptions::default(),
        }
    }
}

impl SessionContext {
    pub fn with_factory(mut self, factory: impl ElementFactory + 'static) -> Self {
        self.factory = Rc::new(factory);
        self
    }

    pub fn with_resolver(mut self, resolver: impl UriResolver + 'static) -> Self {
        self.resolver = Rc::new(resolver);
        self
    }

    pub fn with_observer(mut self, observer: Rc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext").field("options", &self.options).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_load_from_json_with_defaults() {
        let opts: SessionOptions = serde_json::from_str(r#"{"disposeCallables":true}"#).unwrap();
        assert_eq!(
            opts,
            SessionOptions { dispose_callables: true, tolerate_missing_handles_on_error: true }
        );
        let empty: SessionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SessionOptions::default());
    }
}
