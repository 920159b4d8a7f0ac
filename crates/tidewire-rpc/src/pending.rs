//! Pending-entry bookkeeping.
//!
//! Maps each outstanding request identifier to the sender half of its caller's
//! handle. Every entry carries a generation number so a stale actor (a timer or
//! a batch reply) can never resolve a later request that reuses the same id.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use tidewire_core::types::{RequestId, Response};

use crate::assembler::Batch;
use crate::error::DispatchError;

/// What a response handle eventually receives.
pub type Outcome = Result<Response, DispatchError>;

struct PendingEntry {
    tx: oneshot::Sender<Outcome>,
    submitted_at: Instant,
    generation: u64,
    timer: Option<AbortHandle>,
}

/// Outstanding requests keyed by identifier.
#[derive(Default)]
pub struct PendingTable {
    entries: HashMap<RequestId, PendingEntry>,
    next_generation: u64,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a request with `id` is still waiting for its response.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    /// Register a new entry and return its generation.
    ///
    /// Fails with [`DispatchError::DuplicateIdentifier`] if `id` is already
    /// pending; the existing entry is left untouched.
    pub fn insert(
        &mut self,
        id: RequestId,
        tx: oneshot::Sender<Outcome>,
    ) -> Result<u64, DispatchError> {
        if self.entries.contains_key(&id) {
            return Err(DispatchError::DuplicateIdentifier(id));
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            id,
            PendingEntry {
                tx,
                submitted_at: Instant::now(),
                generation,
                timer: None,
            },
        );
        Ok(generation)
    }

    /// Attach the timeout task of an entry so it can be cancelled on resolution.
    pub fn set_timer(&mut self, id: &RequestId, generation: u64, timer: AbortHandle) {
        match self.entries.get_mut(id) {
            Some(entry) if entry.generation == generation => entry.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    /// Identifier and generation of every member of `batch` that is still pending.
    pub fn members(&self, batch: &Batch) -> Vec<(RequestId, u64)> {
        batch
            .ids()
            .filter_map(|id| {
                self.entries
                    .get(id)
                    .map(|entry| (id.clone(), entry.generation))
            })
            .collect()
    }

    /// Deliver `outcome` to the entry `id` if it is still the given generation.
    ///
    /// Returns `false` when no such entry exists (already resolved, timed out,
    /// or never registered).
    pub fn resolve(&mut self, id: &RequestId, generation: u64, outcome: Outcome) -> bool {
        match self.entries.get(id) {
            Some(entry) if entry.generation == generation => {}
            _ => return false,
        }
        match self.entries.remove(id) {
            Some(entry) => {
                deliver(id, entry, outcome);
                true
            }
            None => false,
        }
    }

    /// Resolve every entry with `error`. Returns how many were resolved.
    pub fn drain(&mut self, error: DispatchError) -> usize {
        let count = self.entries.len();
        for (id, entry) in self.entries.drain() {
            deliver(&id, entry, Err(error.clone()));
        }
        count
    }
}

fn deliver(id: &RequestId, entry: PendingEntry, outcome: Outcome) {
    if let Some(timer) = entry.timer {
        timer.abort();
    }
    let elapsed = entry.submitted_at.elapsed();
    let ok = outcome.is_ok();
    if entry.tx.send(outcome).is_err() {
        debug!(%id, "caller dropped its handle before resolution");
        return;
    }
    debug!(%id, ok, elapsed_us = elapsed.as_micros() as u64, "request resolved");
}
