//! Batch assembly.
//!
//! Accumulates submitted requests into an open batch and seals it once the
//! [`BatchPolicy`] says so. The assembler is single-owner; the dispatcher keeps
//! it behind the same lock as its pending-entry table.

use std::time::Instant;

use tidewire_core::config::BatchPolicy;
use tidewire_core::types::{Request, RequestId};

use crate::error::DispatchError;

/// Upper bound on the capacity reserved for an open batch up front.
const PREALLOCATE_LIMIT: usize = 64;

/// A sealed, immutable group of requests sent in one transport exchange.
#[derive(Debug, Clone)]
pub struct Batch {
    seq: u64,
    requests: Vec<Request>,
    single: bool,
}

impl Batch {
    /// Sealing order of this batch within its assembler.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Member requests, in submission order.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Number of member requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the batch carries no requests, as after an empty flush.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Whether the batch was sealed under the no-batching policy and is sent
    /// as a bare request object.
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Identifiers of the member requests, in submission order.
    pub fn ids(&self) -> impl Iterator<Item = &RequestId> {
        self.requests.iter().filter_map(|r| r.id.as_ref())
    }
}

/// Groups requests into batches according to a [`BatchPolicy`].
#[derive(Debug)]
pub struct BatchAssembler {
    policy: BatchPolicy,
    open: Vec<Request>,
    open_since: Option<Instant>,
    next_seq: u64,
    closed: bool,
}

impl BatchAssembler {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            open: Vec::with_capacity(preallocate(policy)),
            open_since: None,
            next_seq: 0,
            closed: false,
        }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Append a request to the open batch.
    ///
    /// Returns the sealed batch when this submission satisfied the policy:
    /// always under [`BatchPolicy::NoBatching`], otherwise once the open batch
    /// holds `max_size` requests.
    pub fn submit(&mut self, request: Request) -> Result<Option<Batch>, DispatchError> {
        if self.closed {
            return Err(DispatchError::DispatcherClosed);
        }
        if self.open.is_empty() {
            self.open_since = Some(Instant::now());
        }
        self.open.push(request);

        if self.open.len() >= self.policy.max_size() {
            Ok(Some(self.seal()))
        } else {
            Ok(None)
        }
    }

    /// Seal the open batch regardless of its size. The result may be empty.
    pub fn flush(&mut self) -> Batch {
        self.seal()
    }

    /// Seal the open batch and refuse every later submission.
    pub fn close(&mut self) -> Batch {
        self.closed = true;
        self.seal()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of requests waiting in the open batch.
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// When the open batch received its first request.
    pub fn open_since(&self) -> Option<Instant> {
        self.open_since
    }

    fn seal(&mut self) -> Batch {
        let requests = std::mem::replace(
            &mut self.open,
            Vec::with_capacity(preallocate(self.policy)),
        );
        self.open_since = None;
        let seq = self.next_seq;
        self.next_seq += 1;
        Batch {
            seq,
            requests,
            single: !self.policy.is_batching(),
        }
    }
}

fn preallocate(policy: BatchPolicy) -> usize {
    policy.max_size().min(PREALLOCATE_LIMIT)
}
