//! Autosave session: one actor per editing session.
//!
//! The host talks to a `Send + Sync` [`AutosaveHandle`]; all state lives in
//! an [`AutosaveActor`] task that handles commands, timer expiries and the
//! outcome of the in-flight request strictly one at a time.
//!
//! ```text
//!   AutosaveHandle              mpsc      AutosaveActor (tokio task)
//!   ┌──────────────────────┐  ───────▶  ┌───────────────────────────────────┐
//!   │ .queue_update()      │            │ PendingEdits   RowStateTracker    │
//!   │ .save_immediate()    │  ◀───────  │ debounce (DelayQueue per row)     │
//!   │ .row_state()         │  oneshot   │ batch window (one shared Sleep)   │
//!   └──────────────────────┘            │ in-flight batch_upsert task       │
//!            ▲                          └───────────────┬───────────────────┘
//!            └──────── broadcast<AutosaveEvent> ────────┘
//! ```
//!
//! Edit → pending buffer + per-row debounce → shared batch window → one
//! `batch_upsert` for every pending row → per-row reconcile. Anything not
//! acknowledged goes back into the pending buffer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sitebook_types::{
    BatchResult, ItemUpdate, RowId, RowSaveState, RowStatePatch, SaveStatus, VersionToken,
    now_millis,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::config::AutosaveConfig;
use crate::error::{AutosaveError, UpsertError};
use crate::events::AutosaveEvent;
use crate::flush::{self, FlushReport, RowOutcome};
use crate::pending::PendingEdits;
use crate::tracker::RowStateTracker;
use crate::upsert::BatchUpsert;

/// Error text recorded on a row whose save hit a version conflict.
pub const CONFLICT_MESSAGE: &str = "row was changed by someone else";

// ============================================================================
// Commands (internal)
// ============================================================================

enum Command {
    // Edits
    Queue(ItemUpdate),
    SaveImmediate(ItemUpdate),
    Retry(Vec<ItemUpdate>),
    ForceLocal(ItemUpdate),
    AcceptServer {
        id: RowId,
        server_updated_at: VersionToken,
    },
    FlushNow {
        reply: oneshot::Sender<()>,
    },

    // Reads
    RowState {
        id: RowId,
        reply: oneshot::Sender<RowSaveState>,
    },
    RowStates {
        reply: oneshot::Sender<BTreeMap<RowId, RowSaveState>>,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
    PendingUpdates {
        reply: oneshot::Sender<Vec<ItemUpdate>>,
    },
    IsSaving {
        reply: oneshot::Sender<bool>,
    },
    LastResults {
        reply: oneshot::Sender<Vec<BatchResult>>,
    },
    LastError {
        reply: oneshot::Sender<Option<String>>,
    },
}

// ============================================================================
// AutosaveHandle (Send + Sync public API)
// ============================================================================

/// Handle to a running autosave session.
///
/// Edit methods never fail: they enqueue and return. Once the session is
/// shut down they do nothing. Read methods fail only with
/// [`AutosaveError::Shutdown`].
#[derive(Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<AutosaveEvent>,
    liveness: CancellationToken,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl AutosaveHandle {
    fn send(&self, cmd: Command) {
        if self.liveness.is_cancelled() {
            trace!("Autosave session shut down, dropping command");
            return;
        }
        if self.tx.send(cmd).is_err() {
            debug!("Autosave actor gone, dropping command");
        }
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AutosaveError> {
        if self.liveness.is_cancelled() {
            return Err(AutosaveError::Shutdown);
        }
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| AutosaveError::Shutdown)?;
        rx.await.map_err(|_| AutosaveError::Shutdown)
    }

    // ── Edits ───────────────────────────────────────────────────────────

    /// Merge an edit into the row's pending update, mark it dirty and
    /// restart its debounce timer.
    pub fn queue_update(&self, update: ItemUpdate) {
        self.send(Command::Queue(update));
    }

    /// Merge an edit and flush everything pending right away.
    ///
    /// For discrete controls (dropdowns, toggles) where a typing delay makes
    /// no sense.
    pub fn save_immediate(&self, update: ItemUpdate) {
        self.send(Command::SaveImmediate(update));
    }

    /// Resend one row with its full current values, clearing its error.
    pub fn retry_save(&self, id: impl Into<RowId>, mut current: ItemUpdate) {
        current.id = id.into();
        self.send(Command::Retry(vec![current]));
    }

    /// [`retry_save`](Self::retry_save) for several rows in one batch.
    pub fn retry_all(&self, rows: Vec<ItemUpdate>) {
        if rows.is_empty() {
            return;
        }
        self.send(Command::Retry(rows));
    }

    /// Resolve a conflict in favour of the local values: the next save of
    /// this row carries no expected version, so the store accepts it.
    pub fn force_local_version(&self, id: impl Into<RowId>, mut current: ItemUpdate) {
        current.id = id.into();
        self.send(Command::ForceLocal(current));
    }

    /// Resolve a conflict in favour of the server: drop the local edit,
    /// adopt the server's version and emit
    /// [`AutosaveEvent::RefetchRequested`] so the host reloads the row.
    pub fn accept_server_version(&self, id: impl Into<RowId>, server_updated_at: VersionToken) {
        self.send(Command::AcceptServer {
            id: id.into(),
            server_updated_at,
        });
    }

    /// Cancel every timer, flush whatever is pending now, then wait
    /// (bounded) for the request to finish.
    ///
    /// Returns true once no flush is in flight; false if the wait ran out
    /// or the session is gone. Call before navigating away.
    pub async fn flush_pending_saves(&self) -> bool {
        if self.query(|reply| Command::FlushNow { reply }).await.is_err() {
            return false;
        }
        for attempt in 0..self.poll_attempts {
            match self.is_saving().await {
                Ok(false) => return true,
                Ok(true) => {
                    trace!(attempt, "Waiting for in-flight flush");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(_) => return false,
            }
        }
        matches!(self.is_saving().await, Ok(false))
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// The row's state, or the default `idle` state if never edited.
    pub async fn row_state(&self, id: impl Into<RowId>) -> Result<RowSaveState, AutosaveError> {
        let id = id.into();
        self.query(|reply| Command::RowState { id, reply }).await
    }

    /// Every row the session has seen, sorted by id.
    pub async fn row_states(&self) -> Result<BTreeMap<RowId, RowSaveState>, AutosaveError> {
        self.query(|reply| Command::RowStates { reply }).await
    }

    pub async fn pending_count(&self) -> Result<usize, AutosaveError> {
        self.query(|reply| Command::PendingCount { reply }).await
    }

    /// Merged pending updates, sorted by row id.
    pub async fn pending_updates(&self) -> Result<Vec<ItemUpdate>, AutosaveError> {
        self.query(|reply| Command::PendingUpdates { reply }).await
    }

    /// Whether a batch request is in flight.
    pub async fn is_saving(&self) -> Result<bool, AutosaveError> {
        self.query(|reply| Command::IsSaving { reply }).await
    }

    /// Raw results of the last batch that got a response.
    pub async fn last_batch_results(&self) -> Result<Vec<BatchResult>, AutosaveError> {
        self.query(|reply| Command::LastResults { reply }).await
    }

    /// The last whole-request failure, if any.
    pub async fn last_error(&self) -> Result<Option<String>, AutosaveError> {
        self.query(|reply| Command::LastError { reply }).await
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<AutosaveEvent> {
        self.events.subscribe()
    }

    /// Tear the session down. Idempotent.
    ///
    /// Takes effect immediately: no state change, timer callback or request
    /// outcome is applied afterwards, and no new request is sent.
    pub fn shutdown(&self) {
        if !self.liveness.is_cancelled() {
            debug!("Autosave session shutdown requested");
        }
        self.liveness.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.liveness.is_cancelled()
    }
}

// ============================================================================
// AutosaveActor (internal, owns all state)
// ============================================================================

type UpsertOutcome = Result<Vec<BatchResult>, UpsertError>;

/// The request currently out, with the edits it carries.
struct InFlight {
    seq: u64,
    snapshot: Vec<ItemUpdate>,
    task: JoinHandle<UpsertOutcome>,
}

/// What asked for a flush that had to wait for the one in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlushTrigger {
    /// Batch window expired: re-open a window afterwards.
    Window,
    /// Explicit save: flush again straight away.
    Immediate,
}

struct AutosaveActor {
    store: Arc<dyn BatchUpsert>,
    config: AutosaveConfig,
    liveness: CancellationToken,
    events: broadcast::Sender<AutosaveEvent>,

    rows: RowStateTracker,
    edits: PendingEdits,

    debounce: DelayQueue<RowId>,
    debounce_keys: HashMap<RowId, delay_queue::Key>,
    batch_timer: Option<Pin<Box<Sleep>>>,
    saved_display: DelayQueue<RowId>,
    saved_keys: HashMap<RowId, delay_queue::Key>,

    in_flight: Option<InFlight>,
    deferred: Option<FlushTrigger>,
    flush_seq: u64,
    /// Rows in the in-flight snapshot whose local edit the user discarded.
    /// Their outcome is not applied.
    resolved_in_flight: HashSet<RowId>,

    last_results: Vec<BatchResult>,
    last_error: Option<String>,
}

async fn wait_in_flight(slot: &mut Option<InFlight>) -> Result<UpsertOutcome, JoinError> {
    match slot {
        Some(in_flight) => (&mut in_flight.task).await,
        None => std::future::pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// One `batch_upsert` call, bounded by `timeout`. Nothing is sent once the
/// session is shut down, even if the task was already spawned.
async fn send_batch(
    store: Arc<dyn BatchUpsert>,
    request: Vec<ItemUpdate>,
    timeout: Option<Duration>,
    liveness: CancellationToken,
) -> UpsertOutcome {
    if liveness.is_cancelled() {
        debug!("Session shut down before send, dropping batch");
        return Err(UpsertError::Unavailable("autosave session shut down".into()));
    }
    debug!("Sending batch");
    let call = store.batch_upsert(request);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(UpsertError::Timeout(limit))),
        None => call.await,
    }
}

impl AutosaveActor {
    fn new(
        store: Arc<dyn BatchUpsert>,
        config: AutosaveConfig,
        liveness: CancellationToken,
        events: broadcast::Sender<AutosaveEvent>,
    ) -> Self {
        Self {
            store,
            config,
            rows: RowStateTracker::new(liveness.clone()),
            liveness,
            events,
            edits: PendingEdits::new(),
            debounce: DelayQueue::new(),
            debounce_keys: HashMap::new(),
            batch_timer: None,
            saved_display: DelayQueue::new(),
            saved_keys: HashMap::new(),
            in_flight: None,
            deferred: None,
            flush_seq: 0,
            resolved_in_flight: HashSet::new(),
            last_results: Vec::new(),
            last_error: None,
        }
    }

    /// Process events until shutdown or until every handle is dropped.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let liveness = self.liveness.clone();
        loop {
            tokio::select! {
                biased;

                _ = liveness.cancelled() => break,

                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("Autosave session ending: all handles dropped");
                        break;
                    }
                },

                joined = wait_in_flight(&mut self.in_flight) => self.finish_flush(joined),

                Some(expired) = self.debounce.next(), if !self.debounce.is_empty() => {
                    self.on_debounce_expired(expired.into_inner());
                }

                () = wait_timer(&mut self.batch_timer) => {
                    self.batch_timer = None;
                    self.start_flush(FlushTrigger::Window);
                }

                Some(expired) = self.saved_display.next(), if !self.saved_display.is_empty() => {
                    self.on_saved_display_expired(expired.into_inner());
                }
            }
        }
        self.tear_down();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Queue(update) => self.queue_update(update),
            Command::SaveImmediate(update) => self.save_immediate(update),
            Command::Retry(rows) => self.retry(rows),
            Command::ForceLocal(update) => self.force_local(update),
            Command::AcceptServer { id, server_updated_at } => {
                self.accept_server(id, server_updated_at)
            }
            Command::FlushNow { reply } => {
                self.cancel_all_timers();
                self.start_flush(FlushTrigger::Immediate);
                let _ = reply.send(());
            }

            Command::RowState { id, reply } => {
                let _ = reply.send(self.rows.get(&id));
            }
            Command::RowStates { reply } => {
                let _ = reply.send(self.rows.snapshot());
            }
            Command::PendingCount { reply } => {
                let _ = reply.send(self.edits.len());
            }
            Command::PendingUpdates { reply } => {
                let _ = reply.send(self.edits.updates());
            }
            Command::IsSaving { reply } => {
                let _ = reply.send(self.in_flight.is_some());
            }
            Command::LastResults { reply } => {
                let _ = reply.send(self.last_results.clone());
            }
            Command::LastError { reply } => {
                let _ = reply.send(self.last_error.clone());
            }
        }
    }

    // ── State tracker ───────────────────────────────────────────────────

    fn set_row_state(&mut self, id: &RowId, patch: RowStatePatch) {
        if let Some(state) = self.rows.set(id, patch) {
            let _ = self.events.send(AutosaveEvent::RowStateChanged {
                id: id.clone(),
                state,
            });
        }
    }

    fn emit(&self, event: AutosaveEvent) {
        if self.rows.is_live() {
            let _ = self.events.send(event);
        }
    }

    // ── Edits ───────────────────────────────────────────────────────────

    fn queue_update(&mut self, update: ItemUpdate) {
        let id = update.id.clone();
        trace!(row = %id, fields = ?update.changed_fields(), "Queued edit");
        self.edits.queue(update);
        self.set_row_state(&id, RowStatePatch::status(SaveStatus::Dirty));
        self.restart_debounce(&id);
    }

    fn save_immediate(&mut self, update: ItemUpdate) {
        let id = update.id.clone();
        self.edits.queue(update);
        self.set_row_state(&id, RowStatePatch::status(SaveStatus::Dirty));
        self.cancel_debounce(&id);
        self.start_flush(FlushTrigger::Immediate);
    }

    fn retry(&mut self, rows: Vec<ItemUpdate>) {
        for update in rows {
            let id = update.id.clone();
            debug!(row = %id, "Retrying save");
            self.edits.queue(update);
            self.cancel_debounce(&id);
            self.set_row_state(
                &id,
                RowStatePatch::status(SaveStatus::Dirty).with_error(None),
            );
        }
        self.schedule_batch();
    }

    fn force_local(&mut self, mut update: ItemUpdate) {
        let id = update.id.clone();
        info!(row = %id, "Overriding server version with local values");
        update.expected_updated_at = None;
        self.edits.forget_version(&id);
        self.edits.queue(update);
        self.cancel_debounce(&id);
        self.set_row_state(
            &id,
            RowStatePatch::status(SaveStatus::Dirty)
                .with_error(None)
                .with_server_updated_at(None),
        );
        self.schedule_batch();
    }

    fn accept_server(&mut self, id: RowId, server_updated_at: VersionToken) {
        info!(row = %id, version = %server_updated_at, "Accepting server version");
        self.cancel_debounce(&id);
        if self.edits.discard(&id).is_some() {
            debug!(row = %id, "Discarded local edit");
        }
        self.edits.record_version(&id, server_updated_at);
        if let Some(in_flight) = &self.in_flight
            && in_flight.snapshot.iter().any(|update| update.id == id)
        {
            debug!(row = %id, flush = in_flight.seq, "Accepted row is in flight");
            self.resolved_in_flight.insert(id.clone());
        }
        self.set_row_state(
            &id,
            RowStatePatch::status(SaveStatus::Idle)
                .with_error(None)
                .with_server_updated_at(None),
        );
        self.emit(AutosaveEvent::RefetchRequested { id });
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    fn restart_debounce(&mut self, id: &RowId) {
        let delay = self.config.debounce();
        match self.debounce_keys.get(id) {
            Some(key) => self.debounce.reset(key, delay),
            None => {
                let key = self.debounce.insert(id.clone(), delay);
                self.debounce_keys.insert(id.clone(), key);
            }
        }
    }

    fn cancel_debounce(&mut self, id: &RowId) {
        if let Some(key) = self.debounce_keys.remove(id) {
            self.debounce.remove(&key);
        }
    }

    fn on_debounce_expired(&mut self, id: RowId) {
        self.debounce_keys.remove(&id);
        trace!(row = %id, "Debounce elapsed");
        self.schedule_batch();
    }

    /// Open the shared batch window unless one is already open.
    fn schedule_batch(&mut self) {
        if self.batch_timer.is_none() && self.rows.is_live() {
            self.batch_timer = Some(Box::pin(tokio::time::sleep(self.config.batch_window())));
        }
    }

    fn cancel_all_timers(&mut self) {
        self.debounce.clear();
        self.debounce_keys.clear();
        self.batch_timer = None;
    }

    fn schedule_saved_revert(&mut self, id: &RowId) {
        let delay = self.config.saved_display();
        match self.saved_keys.get(id) {
            Some(key) => self.saved_display.reset(key, delay),
            None => {
                let key = self.saved_display.insert(id.clone(), delay);
                self.saved_keys.insert(id.clone(), key);
            }
        }
    }

    fn on_saved_display_expired(&mut self, id: RowId) {
        self.saved_keys.remove(&id);
        if self.rows.get(&id).status == SaveStatus::Saved {
            self.set_row_state(&id, RowStatePatch::status(SaveStatus::Idle));
        }
    }

    // ── Flush ───────────────────────────────────────────────────────────

    fn start_flush(&mut self, trigger: FlushTrigger) {
        if !self.rows.is_live() {
            return;
        }
        if self.in_flight.is_some() {
            debug!(?trigger, "Flush already in flight, deferring");
            if self.deferred != Some(FlushTrigger::Immediate) {
                self.deferred = Some(trigger);
            }
            return;
        }
        if self.edits.is_empty() {
            trace!("Nothing pending, skipping flush");
            return;
        }

        self.flush_seq += 1;
        let seq = self.flush_seq;
        let snapshot = self.edits.take_all();
        for update in &snapshot {
            self.set_row_state(
                &update.id,
                RowStatePatch::status(SaveStatus::Saving).with_error(None),
            );
        }
        let request = flush::prepare_request(&snapshot, &self.edits);

        let span = info_span!("autosave_flush", flush = seq, rows = snapshot.len());
        let task = tokio::spawn(
            send_batch(
                Arc::clone(&self.store),
                request,
                self.config.request_timeout(),
                self.liveness.clone(),
            )
            .instrument(span),
        );

        self.in_flight = Some(InFlight { seq, snapshot, task });
    }

    fn finish_flush(&mut self, joined: Result<UpsertOutcome, JoinError>) {
        let Some(InFlight { seq, snapshot, .. }) = self.in_flight.take() else {
            return;
        };
        if !self.rows.is_live() {
            self.resolved_in_flight.clear();
            return;
        }

        let report = match joined {
            Ok(Ok(results)) => {
                let report = flush::reconcile(snapshot, &results);
                self.last_results = results;
                report
            }
            Ok(Err(err)) => {
                warn!(flush = seq, "Batch save failed: {err}");
                let message = err.to_string();
                self.last_error = Some(message.clone());
                flush::fail_all(snapshot, &message)
            }
            Err(err) => {
                warn!(flush = seq, "Batch save task failed: {err}");
                let message = format!("save request failed: {err}");
                self.last_error = Some(message.clone());
                flush::fail_all(snapshot, &message)
            }
        };
        self.apply_report(seq, report);

        match self.deferred.take() {
            Some(FlushTrigger::Immediate) => self.start_flush(FlushTrigger::Immediate),
            Some(FlushTrigger::Window) => self.schedule_batch(),
            None => {}
        }
    }

    fn apply_report(&mut self, seq: u64, report: FlushReport) {
        let report = self.drop_resolved(report);
        let total = report.total();
        let saved = report.saved_count();
        let failed = report.failed_count();
        let now = now_millis();

        for (id, outcome) in report.outcomes {
            match outcome {
                RowOutcome::Saved { updated_at } => {
                    match updated_at {
                        Some(token) => self.edits.record_version(&id, token),
                        None => {
                            warn!(row = %id, "Store acknowledged save without a version");
                            self.edits.forget_version(&id);
                        }
                    }
                    // Edited again while the request was out
                    let still_dirty = self.edits.contains(&id);
                    let status = if still_dirty {
                        SaveStatus::Dirty
                    } else {
                        SaveStatus::Saved
                    };
                    self.set_row_state(
                        &id,
                        RowStatePatch::status(status)
                            .with_error(None)
                            .with_last_saved(now)
                            .with_server_updated_at(None),
                    );
                    if !still_dirty {
                        self.schedule_saved_revert(&id);
                    }
                }
                RowOutcome::Conflict { server_updated_at, edit } => {
                    warn!(row = %id, server = ?server_updated_at, "Save conflict");
                    self.edits.restore(edit);
                    self.set_row_state(
                        &id,
                        RowStatePatch::status(SaveStatus::Conflict)
                            .with_error(Some(CONFLICT_MESSAGE.to_string()))
                            .with_server_updated_at(server_updated_at),
                    );
                }
                RowOutcome::Failed { message, edit } => {
                    warn!(row = %id, "Save failed: {message}");
                    self.edits.restore(edit);
                    self.set_row_state(
                        &id,
                        RowStatePatch::status(SaveStatus::Error).with_error(Some(message)),
                    );
                }
            }
        }

        info!(flush = seq, saved, failed, "Flush reconciled");
        if failed > 0 {
            self.emit(AutosaveEvent::FlushFailed {
                failed,
                total,
                message: flush::failure_notice(failed, total),
            });
        }
        self.emit(AutosaveEvent::FlushCompleted { saved, failed });
    }

    /// Take out rows the user resolved while the request was out. Their
    /// edit stays discarded and their state stays as the user left it.
    fn drop_resolved(&mut self, report: FlushReport) -> FlushReport {
        let resolved = std::mem::take(&mut self.resolved_in_flight);
        if resolved.is_empty() {
            return report;
        }
        let mut outcomes = Vec::with_capacity(report.outcomes.len());
        for (id, outcome) in report.outcomes {
            if !resolved.contains(&id) {
                outcomes.push((id, outcome));
                continue;
            }
            if let RowOutcome::Saved {
                updated_at: Some(token),
            } = outcome
            {
                // The discarded values reached the store anyway
                self.edits.record_version(&id, token);
                self.emit(AutosaveEvent::RefetchRequested { id });
            }
        }
        FlushReport { outcomes }
    }

    fn tear_down(&mut self) {
        self.resolved_in_flight.clear();
        self.liveness.cancel();
        if let Some(in_flight) = self.in_flight.take() {
            debug!(flush = in_flight.seq, "Abandoning in-flight flush");
            in_flight.task.abort();
        }
        self.cancel_all_timers();
        self.saved_display.clear();
        self.saved_keys.clear();
        if !self.edits.is_empty() {
            warn!(rows = self.edits.len(), "Autosave session ended with unsaved edits");
        }
        debug!("Autosave session torn down");
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Start an autosave session on the current tokio runtime.
///
/// The session runs until [`AutosaveHandle::shutdown`] is called or every
/// handle is dropped.
pub fn spawn_session<S: BatchUpsert>(store: S, config: AutosaveConfig) -> AutosaveHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(config.event_capacity.max(1));
    let liveness = CancellationToken::new();

    let handle = AutosaveHandle {
        tx,
        events: events.clone(),
        liveness: liveness.clone(),
        poll_attempts: config.flush_poll_attempts.max(1),
        poll_interval: config.flush_poll_interval(),
    };

    let store: Arc<dyn BatchUpsert> = Arc::new(store);
    let actor = AutosaveActor::new(store, config, liveness, events);
    tokio::spawn(actor.run(rx));
    handle
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchUpsert for CountingStore {
        async fn batch_upsert(
            &self,
            items: Vec<ItemUpdate>,
        ) -> Result<Vec<BatchResult>, UpsertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(items
                .into_iter()
                .map(|item| BatchResult::saved(item.id, VersionToken::from("v1")))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_send_batch_skips_store_after_shutdown() {
        let store = Arc::new(CountingStore::default());
        let liveness = CancellationToken::new();
        liveness.cancel();

        let request = vec![ItemUpdate::new("r1").with_quantity(1.0)];
        let outcome = send_batch(store.clone(), request, None, liveness).await;

        assert!(matches!(outcome, Err(UpsertError::Unavailable(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_batch_calls_store_while_live() {
        let store = Arc::new(CountingStore::default());

        let request = vec![ItemUpdate::new("r1").with_quantity(1.0)];
        let outcome = send_batch(
            store.clone(),
            request,
            Some(Duration::from_secs(1)),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.unwrap().len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
