//! Caller-side view of a dispatched request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use tidewire_core::types::{RequestId, Response};

use crate::error::DispatchError;
use crate::pending::Outcome;

/// Resolves exactly once with the response to a dispatched request.
///
/// The handle can be awaited, polled with [`try_result`](Self::try_result),
/// waited on from synchronous code with [`blocking_wait`](Self::blocking_wait),
/// or given a callback with [`on_complete`](Self::on_complete).
#[derive(Debug)]
pub struct ResponseHandle {
    id: Option<RequestId>,
    rx: oneshot::Receiver<Outcome>,
    taken: bool,
}

impl ResponseHandle {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            id: Some(id),
            rx,
            taken: false,
        }
    }

    /// A handle that is already resolved with `error`.
    pub(crate) fn rejected(id: Option<RequestId>, error: DispatchError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self {
            id,
            rx,
            taken: false,
        }
    }

    /// Identifier the request was dispatched under. `None` only when the
    /// request was rejected for lacking one.
    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Non-blocking check. Returns the outcome the first time it is available,
    /// `None` before that and on every later call.
    pub fn try_result(&mut self) -> Option<Outcome> {
        if self.taken {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(DispatchError::DispatcherClosed),
        };
        self.taken = true;
        Some(outcome)
    }

    /// Block the current thread until the request resolves.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_wait(self) -> Outcome {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(DispatchError::DispatcherClosed))
    }

    /// Run `callback` with the outcome on the tokio runtime.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }
}

impl Future for ResponseHandle {
    type Output = Result<Response, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::DispatcherClosed)))
    }
}
