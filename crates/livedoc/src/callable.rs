//! Client-side wrappers for server callables.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use livedoc_rpc::RpcChannel;
use serde_json::{json, Value};
use tracing::{trace, warn};

use crate::error::WidgetError;
use crate::hydrated::Hydrated;
use crate::payload::decode_result;

/// Notification sent when a callable is no longer referenced.
pub const DISPOSE_CALLABLE: &str = "disposeCallable";

struct Inner {
    id: String,
    channel: RpcChannel,
}

/// A live server function. Invoking it sends a request whose method name is
/// the callable id.
///
/// Clones share identity: [`Callable::ptr_eq`] holds between a wrapper and
/// its clones, and the hydrator hands out the same wrapper for as long as
/// the id stays referenced.
#[derive(Clone)]
pub struct Callable(Rc<Inner>);

impl Callable {
    pub(crate) fn new(id: impl Into<String>, channel: &RpcChannel) -> Self {
        Self(Rc::new(Inner { id: id.into(), channel: channel.clone() }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn ptr_eq(a: &Callable, b: &Callable) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Invoke the callable with positional arguments.
    ///
    /// The result is decoded like an event payload, so it may carry fresh
    /// callables of its own.
    pub fn call(&self, args: Vec<Value>) -> impl Future<Output = Result<Hydrated, WidgetError>> + 'static {
        trace!(id = %self.0.id, "invoking callable");
        let pending = self.0.channel.call(&self.0.id, Value::Array(args));
        let channel = self.0.channel.clone();
        async move {
            let result = pending.await?;
            Ok::<Hydrated, WidgetError>(decode_result(result, &channel)?)
        }
    }

    pub(crate) fn dispose(&self) {
        if let Err(err) = self.0.channel.notify(DISPOSE_CALLABLE, json!([self.0.id])) {
            warn!(id = %self.0.id, error = %err, "callable disposal not sent");
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callable").field(&self.0.id).finish()
    }
}
