//! Client-side mirror of a server-driven UI document.
//!
//! A [`WidgetSession`] sits on one widget transport. The server drives it
//! with JSON-RPC notifications: `documentPatched` carries a JSON Patch
//! against the current document, `documentError` puts the session into an
//! error state, and `event` triggers a side effect. After every patch the
//! session hydrates the document: sentinel objects become live
//! [`Callable`]s, exported objects, URI objects or presentation nodes built
//! by the host's [`ElementFactory`]. Handles that the new document no longer
//! references are closed in the same pass.
//!
//! [`WidgetHost`] adds widget replacement on top: attaching a new transport
//! tears the old session down and opens a fresh one from the latest view
//! state.

pub mod callable;
pub mod error;
pub mod events;
pub mod host;
pub mod hydrate;
pub mod hydrated;
pub mod options;
pub mod payload;
pub mod refs;
pub mod resource;
pub mod sentinel;
pub mod session;

pub use callable::Callable;
pub use error::{DocumentError, HydrateError, ProtocolError, StateParseError, WidgetError};
pub use events::{Navigate, Toast};
pub use host::WidgetHost;
pub use hydrate::{hydrate, HydrateEnv};
pub use hydrated::{ExportedObject, Hydrated, HydratedMap, UriObject};
pub use options::{NoopObserver, SessionContext, SessionObserver, SessionOptions};
pub use payload::{decode_doc, decode_payload};
pub use refs::{ReferenceTable, ReferenceTables};
pub use resource::{ElementFactory, ElementNode, NoUriResolver, PlainElements, PresentationNode, ResourceHandle, SharedHandle, UriResolver};
pub use sentinel::Sentinel;
pub use session::{
    ErrorState, ReloadAction, SessionSnapshot, Status, TransportMessage, WidgetSession, WidgetTransport,
};
