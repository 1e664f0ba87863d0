//! JSON-RPC 2.0 over a single ordered message transport.
//!
//! One [`RpcChannel`] exists per transport. It both serves inbound methods
//! and issues outbound calls, correlating responses by id only.

pub mod channel;
pub mod message;

pub use channel::{CallError, Method, MethodFuture, Outbound, PendingCall, RpcChannel, TransportError};
pub use message::{Message, RequestId, RpcError};
