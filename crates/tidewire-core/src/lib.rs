//! # tidewire-core
//!
//! JSON-RPC 2.0 wire types and the dispatcher configuration shared by the
//! tidewire crates.

pub mod config;
pub mod types;

pub use config::{BatchPolicy, ConfigError, DispatcherConfig, IdStrategy};
pub use types::{Request, RequestId, Response, ResponseParseError, RpcError};
