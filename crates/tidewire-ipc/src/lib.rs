//! # tidewire-ipc
//!
//! Local-node transport over Unix domain sockets. Envelopes are exchanged as
//! newline-delimited JSON, one exchange at a time per connection.

#[cfg(unix)]
pub mod socket;

#[cfg(unix)]
pub use socket::IpcTransport;
