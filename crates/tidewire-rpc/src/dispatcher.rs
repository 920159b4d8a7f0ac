//! Request dispatcher.
//!
//! [`RequestDispatcher::dispatch`] registers a pending entry, feeds the request
//! to the [`BatchAssembler`] and returns a [`ResponseHandle`] at once. Sealed
//! batches are handed, in sealing order, to a single worker task that encodes
//! them and runs each transport exchange on its own task. Replies are matched
//! to pending entries strictly by identifier.
//!
//! The assembler and the pending table share one mutex, and sealed batches are
//! queued to the worker while it is held, so the worker sees batches in the
//! order they were sealed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use tidewire_core::config::{ConfigError, DispatcherConfig, IdStrategy};
use tidewire_core::types::{Request, RequestId, Response};

use crate::assembler::{Batch, BatchAssembler};
use crate::envelope;
use crate::error::DispatchError;
use crate::handle::ResponseHandle;
use crate::pending::PendingTable;
use crate::transport::{Transport, TransportError};

/// Dispatches JSON-RPC requests over a shared transport.
///
/// Cheap to clone; all clones feed the same worker. The worker shuts down on
/// [`close`](Self::close) or once every clone has been dropped; either way
/// nothing is left pending.
#[derive(Clone)]
pub struct RequestDispatcher {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

/// State reachable from callers, the worker, send tasks and timers.
struct Shared {
    config: DispatcherConfig,
    /// Runtime the dispatcher was built on; timers run here whichever thread
    /// dispatches.
    runtime: Handle,
    state: Mutex<State>,
    next_id: AtomicU64,
}

struct State {
    assembler: BatchAssembler,
    pending: PendingTable,
}

/// A batch plus the pending entries it was sealed with.
struct SealedBatch {
    batch: Batch,
    members: Vec<(RequestId, u64)>,
}

enum Command {
    Send(SealedBatch),
    /// A new open batch started; re-arm the linger deadline.
    Wake,
    Close(oneshot::Sender<()>),
}

impl RequestDispatcher {
    /// Create a dispatcher and spawn its worker.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: DispatcherConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::current();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                assembler: BatchAssembler::new(config.batching),
                pending: PendingTable::new(),
            }),
            config,
            runtime: runtime.clone(),
            next_id: AtomicU64::new(1),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            shared: shared.clone(),
            transport,
            commands: rx,
            loopback: tx.downgrade(),
            queued: VecDeque::new(),
            in_flight: JoinSet::new(),
        };
        runtime.spawn(worker.run());

        Ok(Self {
            shared,
            commands: tx,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    /// Number of requests still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().assembler.is_closed()
    }

    /// Submit a request. The returned handle resolves exactly once.
    ///
    /// Safe to call from any thread, inside a runtime or not.
    ///
    /// Requests without an id are numbered under [`IdStrategy::Sequential`]
    /// and rejected under [`IdStrategy::CallerSupplied`]. A request whose id
    /// is already pending is rejected without disturbing the existing entry.
    pub fn dispatch(&self, mut request: Request) -> ResponseHandle {
        let id = match self.assign_id(&mut request) {
            Ok(id) => id,
            Err(e) => {
                warn!(method = %request.method, "rejecting request: {e}");
                return ResponseHandle::rejected(None, e);
            }
        };

        let mut state = self.shared.lock();
        if state.assembler.is_closed() {
            return ResponseHandle::rejected(Some(id), DispatchError::DispatcherClosed);
        }
        if state.pending.contains(&id) {
            warn!(%id, "rejecting request with duplicate identifier");
            return ResponseHandle::rejected(Some(id.clone()), DispatchError::DuplicateIdentifier(id));
        }

        let (tx, rx) = oneshot::channel();
        let generation = match state.pending.insert(id.clone(), tx) {
            Ok(generation) => generation,
            Err(e) => return ResponseHandle::rejected(Some(id), e),
        };

        if let Some(timeout) = self.shared.config.request_timeout {
            let timer = self.shared.runtime.spawn(expire(
                Arc::downgrade(&self.shared),
                id.clone(),
                generation,
                timeout,
            ));
            state.pending.set_timer(&id, generation, timer.abort_handle());
        }

        let opens_batch = state.assembler.open_len() == 0;
        match state.assembler.submit(request) {
            Ok(Some(batch)) => self.hand_off(&mut state, batch),
            Ok(None) => {
                if opens_batch && self.shared.config.linger.is_some() {
                    let _ = self.commands.send(Command::Wake);
                }
            }
            Err(e) => {
                state.pending.resolve(&id, generation, Err(e));
            }
        }

        ResponseHandle::new(id, rx)
    }

    /// Seal and send the open batch now, whatever its size.
    pub fn flush(&self) {
        let mut state = self.shared.lock();
        if state.assembler.is_closed() {
            return;
        }
        let batch = state.assembler.flush();
        self.hand_off(&mut state, batch);
    }

    /// Shut the dispatcher down.
    ///
    /// Flushes the open batch, waits for in-flight batches (at most
    /// `shutdown_grace`), resolves whatever is still pending with
    /// [`DispatchError::DispatcherClosed`] and rejects every later dispatch.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            if !state.assembler.is_closed() {
                let batch = state.assembler.close();
                self.hand_off(&mut state, batch);
            }
            if self.commands.send(Command::Close(ack_tx)).is_err() {
                state.pending.drain(DispatchError::DispatcherClosed);
                return;
            }
        }
        let _ = ack_rx.await;
    }

    fn assign_id(&self, request: &mut Request) -> Result<RequestId, DispatchError> {
        if let Some(id) = &request.id {
            return Ok(id.clone());
        }
        match self.shared.config.id_strategy {
            IdStrategy::Sequential => {
                let id = RequestId::Number(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
                request.id = Some(id.clone());
                Ok(id)
            }
            IdStrategy::CallerSupplied => Err(DispatchError::MissingIdentifier),
        }
    }

    /// Queue a sealed batch for the worker. Must be called with the state lock held.
    fn hand_off(&self, state: &mut State, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        let members = state.pending.members(&batch);
        if let Err(mpsc::error::SendError(Command::Send(sealed))) =
            self.commands.send(Command::Send(SealedBatch { batch, members }))
        {
            for (id, generation) in sealed.members {
                state
                    .pending
                    .resolve(&id, generation, Err(DispatchError::DispatcherClosed));
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the open batch must be sealed by the linger rule, if ever.
    fn linger_deadline(&self) -> Option<Instant> {
        let linger = self.config.linger?;
        let opened = self.lock().assembler.open_since()?;
        Some(Instant::from_std(opened) + linger)
    }

    /// Match a transport reply against the members of the batch it answers.
    fn demultiplex(&self, sealed: SealedBatch, reply: Result<Value, TransportError>) {
        let seq = sealed.batch.seq();
        let mut awaiting: HashMap<RequestId, u64> = sealed.members.into_iter().collect();

        let elements = match reply
            .map_err(|e| e.to_string())
            .and_then(|reply| envelope::split_reply(reply).map_err(|e| e.to_string()))
        {
            Ok(elements) => elements,
            Err(reason) => {
                error!(batch = seq, size = awaiting.len(), %reason, "batch failed");
                let mut state = self.lock();
                for (id, generation) in awaiting {
                    state.pending.resolve(
                        &id,
                        generation,
                        Err(DispatchError::TransportFailure(reason.clone())),
                    );
                }
                return;
            }
        };

        debug!(batch = seq, responses = elements.len(), "batch reply received");
        let mut state = self.lock();
        for element in elements {
            let Some(id) = RequestId::from_object(&element) else {
                warn!(batch = seq, "discarding response without a usable id");
                continue;
            };
            let Some(generation) = awaiting.remove(&id) else {
                warn!(batch = seq, %id, "discarding unmatched response");
                continue;
            };
            let outcome = Response::from_value(element).map_err(|e| {
                warn!(batch = seq, %id, "malformed response: {e}");
                DispatchError::MalformedResponse {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            });
            if !state.pending.resolve(&id, generation, outcome) {
                warn!(batch = seq, %id, "discarding stale response");
            }
        }

        for (id, generation) in awaiting {
            let failure = DispatchError::TransportFailure(format!(
                "batch reply carried no response for request {id}"
            ));
            if state.pending.resolve(&id, generation, Err(failure)) {
                warn!(batch = seq, %id, "request missing from batch reply");
            }
        }
    }
}

/// Resolve a request with [`DispatchError::Timeout`] unless it completes first.
async fn expire(shared: Weak<Shared>, id: RequestId, generation: u64, after: Duration) {
    time::sleep(after).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let timeout = DispatchError::Timeout(id.clone());
    if shared.lock().pending.resolve(&id, generation, Err(timeout)) {
        debug!(%id, timeout_ms = after.as_millis() as u64, "request timed out");
    }
}

/// The single serialized execution context that sends batches.
struct Worker {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Lets linger-sealed batches join the command queue behind earlier ones
    /// without keeping the queue open on its own.
    loopback: mpsc::WeakUnboundedSender<Command>,
    /// Sealed batches waiting for an in-flight slot, in sealing order.
    queued: VecDeque<SealedBatch>,
    in_flight: JoinSet<()>,
}

impl Worker {
    async fn run(mut self) {
        info!(policy = ?self.shared.config.batching, "dispatch worker started");

        let ack = loop {
            self.launch_queued();
            let deadline = self.shared.linger_deadline();
            let linger = async {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(sealed)) => self.queued.push_back(sealed),
                    Some(Command::Wake) => {}
                    Some(Command::Close(ack)) => break Some(ack),
                    None => break None,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    log_join(joined);
                }
                _ = linger => self.seal_lingering(),
            }
        };

        {
            let mut state = self.shared.lock();
            if !state.assembler.is_closed() {
                // Every handle was dropped; the open batch is abandoned.
                state.assembler.close();
            }
        }
        self.drain().await;
        let closed = self.shared.lock().pending.drain(DispatchError::DispatcherClosed);
        if closed > 0 {
            warn!(count = closed, "resolved pending requests as closed");
        }
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        info!("dispatch worker stopped");
    }

    /// Seal the open batch if it has waited out the linger period.
    fn seal_lingering(&mut self) {
        let Some(linger) = self.shared.config.linger else {
            return;
        };
        let Some(commands) = self.loopback.upgrade() else {
            return;
        };
        let mut state = self.shared.lock();
        match state.assembler.open_since() {
            Some(opened) if opened.elapsed() >= linger => {}
            _ => return,
        }
        let batch = state.assembler.flush();
        debug!(batch = batch.seq(), size = batch.len(), "sealing lingering batch");
        let members = state.pending.members(&batch);
        if let Err(mpsc::error::SendError(Command::Send(sealed))) =
            commands.send(Command::Send(SealedBatch { batch, members }))
        {
            for (id, generation) in sealed.members {
                state
                    .pending
                    .resolve(&id, generation, Err(DispatchError::DispatcherClosed));
            }
        }
    }

    fn has_capacity(&self) -> bool {
        self.shared
            .config
            .max_in_flight_batches
            .map_or(true, |limit| self.in_flight.len() < limit)
    }

    /// Start queued batches while the in-flight limit allows.
    fn launch_queued(&mut self) {
        while self.has_capacity() {
            let Some(sealed) = self.queued.pop_front() else {
                break;
            };
            self.launch(sealed);
        }
    }

    /// Encode a batch and start its transport exchange.
    fn launch(&mut self, sealed: SealedBatch) {
        let envelope = match envelope::encode(&sealed.batch) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.shared.demultiplex(sealed, Err(TransportError::Serde(e)));
                return;
            }
        };

        debug!(
            batch = sealed.batch.seq(),
            size = sealed.batch.len(),
            in_flight = self.in_flight.len(),
            "sending batch"
        );
        let transport = self.transport.clone();
        let shared = self.shared.clone();
        self.in_flight.spawn(async move {
            let mut exchange = Exchange {
                shared,
                sealed: Some(sealed),
            };
            let reply = transport.send(envelope).await;
            if let Some(sealed) = exchange.sealed.take() {
                exchange.shared.demultiplex(sealed, reply);
            }
        });
    }

    /// Send queued batches and wait for in-flight ones, aborting whatever is
    /// left once the grace period ends.
    async fn drain(&mut self) {
        let grace = self.shared.config.shutdown_grace;
        let finished = time::timeout(grace, async {
            loop {
                self.launch_queued();
                match self.in_flight.join_next().await {
                    Some(joined) => log_join(joined),
                    None => break,
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!(
                remaining = self.in_flight.len(),
                queued = self.queued.len(),
                grace_ms = grace.as_millis() as u64,
                "shutdown grace elapsed, aborting in-flight batches"
            );
            self.in_flight.abort_all();
            while self.in_flight.join_next().await.is_some() {}
        }

        let mut state = self.shared.lock();
        for sealed in self.queued.drain(..) {
            for (id, generation) in sealed.members {
                state
                    .pending
                    .resolve(&id, generation, Err(DispatchError::DispatcherClosed));
            }
        }
    }
}

/// A batch whose transport exchange is running.
///
/// If the send task is aborted or panics before the reply is demultiplexed,
/// dropping this resolves every member that is still pending.
struct Exchange {
    shared: Arc<Shared>,
    sealed: Option<SealedBatch>,
}

impl Drop for Exchange {
    fn drop(&mut self) {
        let Some(sealed) = self.sealed.take() else {
            return;
        };
        let mut state = self.shared.lock();
        let error = if state.assembler.is_closed() {
            DispatchError::DispatcherClosed
        } else {
            DispatchError::TransportFailure("batch exchange was interrupted".into())
        };
        for (id, generation) in sealed.members {
            state.pending.resolve(&id, generation, Err(error.clone()));
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("batch send task panicked: {e}");
        }
    }
}
