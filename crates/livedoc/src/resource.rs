//! Collaborator seams: live resource handles, URI resolution and the
//! presentation layer's element factory.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::hydrated::HydratedMap;

/// A closeable handle to a server-side object.
///
/// Handles delivered with a transport message, and handles built by a
/// [`UriResolver`], are owned by the session's reference tables. The session
/// calls [`close`](Self::close) exactly once, when the current document stops
/// referencing the handle or when the session is torn down.
pub trait ResourceHandle {
    fn kind(&self) -> &str {
        "object"
    }

    fn close(&self);
}

pub type SharedHandle = Rc<dyn ResourceHandle>;

impl fmt::Debug for dyn ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.kind())
    }
}

/// Builds handles for objects addressed by URI.
pub trait UriResolver {
    fn resolve(&self, uri: &str) -> Result<SharedHandle, String>;
}

/// Resolver for hosts without URI support. Every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUriResolver;

impl UriResolver for NoUriResolver {
    fn resolve(&self, uri: &str) -> Result<SharedHandle, String> {
        Err(format!("no resolver configured for {uri}"))
    }
}

/// A node produced by the presentation layer.
pub trait PresentationNode: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug> PresentationNode for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Turns a structural node (type tag plus hydrated props) into a
/// presentation node.
pub trait ElementFactory {
    fn create(&self, name: &str, props: HydratedMap) -> Result<Rc<dyn PresentationNode>, String>;
}

/// The structural node as the engine sees it.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub name: String,
    pub props: HydratedMap,
}

/// Factory that keeps elements as plain [`ElementNode`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainElements;

impl ElementFactory for PlainElements {
    fn create(&self, name: &str, props: HydratedMap) -> Result<Rc<dyn PresentationNode>, String> {
        Ok(Rc::new(ElementNode { name: name.to_string(), props }))
    }
}
