//! # tidewire-rpc
//!
//! Request dispatcher for JSON-RPC endpoints: callers submit individual
//! requests, the dispatcher coalesces them into batches, ships them over a
//! [`Transport`](transport::Transport) and routes every reply back to its caller
//! by identifier.

pub mod assembler;
pub mod client;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod pending;
pub mod transport;

pub use assembler::{Batch, BatchAssembler};
pub use client::HttpTransport;
pub use dispatcher::RequestDispatcher;
pub use error::DispatchError;
pub use handle::ResponseHandle;
pub use transport::{Transport, TransportError};
