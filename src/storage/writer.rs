//! Single background writer.
//!
//! Every mutation flows through one tokio task that stages ops on the backend and commits them in
//! batches, once `max_pending` ops have accumulated or `max_delay` has passed since the first
//! uncommitted op. Shutdown drains the queue and commits before the task exits.
//!
//! Until an op is staged, the writer keeps the latest value of its key in an unbounded overlay,
//! so readers see every submitted write whether or not the hot mirror still holds it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backend::{CommitStats, RecordBackend, WriteOp};
use super::error::{StorageError, StorageResult};
use super::model::CacheRecord;
use crate::constants::{DEFAULT_COMMIT_EVERY, DEFAULT_COMMIT_INTERVAL_MS};

/// When staged ops become durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub max_pending: usize,
    pub max_delay: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_COMMIT_EVERY,
            max_delay: Duration::from_millis(DEFAULT_COMMIT_INTERVAL_MS),
        }
    }
}

/// Totals reported when the writer exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub ops: usize,
    pub commits: usize,
    pub applied: usize,
    pub failed: usize,
}

impl WriterStats {
    fn absorb(&mut self, commit: CommitStats) {
        self.commits += 1;
        self.applied += commit.applied;
        self.failed += commit.failed;
    }
}

/// State of a key whose latest op has not reached the backend yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingView {
    Present(Arc<CacheRecord>),
    Deleted,
}

#[derive(Debug, Default)]
struct Unstaged {
    next_seq: u64,
    /// Latest queued value per key, tagged with the sequence number of its op.
    views: HashMap<String, (u64, PendingView)>,
    /// Sequence number of a queued `ClearAll`.
    clear: Option<u64>,
}

impl Unstaged {
    fn record(&mut self, op: &WriteOp) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        match op {
            WriteOp::Put { key, record } => {
                let view = PendingView::Present(Arc::new(record.clone()));
                self.views.insert(key.clone(), (seq, view));
            }
            WriteOp::Delete { key } => {
                self.views.insert(key.clone(), (seq, PendingView::Deleted));
            }
            WriteOp::ClearAll => {
                self.views.clear();
                self.clear = Some(seq);
            }
        }
        seq
    }

    fn release(&mut self, seq: u64, op: &WriteOp) {
        match op.key() {
            Some(key) => {
                if self.views.get(key).is_some_and(|(latest, _)| *latest == seq) {
                    self.views.remove(key);
                }
            }
            None => {
                if self.clear == Some(seq) {
                    self.clear = None;
                }
            }
        }
    }

    fn view(&self, key: &str) -> Option<PendingView> {
        match self.views.get(key) {
            Some((_, view)) => Some(view.clone()),
            None if self.clear.is_some() => Some(PendingView::Deleted),
            None => None,
        }
    }
}

enum WriterMessage {
    Op { seq: u64, op: WriteOp },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the background writer task.
pub struct RecordWriter {
    tx: mpsc::UnboundedSender<WriterMessage>,
    task: Mutex<Option<JoinHandle<WriterStats>>>,
    queued: Arc<AtomicUsize>,
    unstaged: Arc<Mutex<Unstaged>>,
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("queued", &self.pending())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl RecordWriter {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn RecordBackend>, policy: CommitPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let unstaged = Arc::new(Mutex::new(Unstaged::default()));
        let state = WriterLoop {
            backend,
            policy,
            queued: Arc::clone(&queued),
            unstaged: Arc::clone(&unstaged),
            uncommitted: 0,
            deadline: None,
            stats: WriterStats::default(),
        };
        let task = tokio::spawn(run(state, rx));

        Self {
            tx,
            task: Mutex::new(Some(task)),
            queued,
            unstaged,
        }
    }

    /// Enqueues `op`. Never blocks.
    pub fn submit(&self, op: WriteOp) -> StorageResult<()> {
        if self.tx.is_closed() {
            return Err(StorageError::WriterClosed);
        }

        // The lock spans the send so sequence numbers follow channel order.
        let mut unstaged = self.unstaged.lock();
        let seq = unstaged.record(&op);
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.tx.send(WriterMessage::Op { seq, op }).map_err(|err| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            if let WriterMessage::Op { seq, op } = err.0 {
                unstaged.release(seq, &op);
            }
            StorageError::WriterClosed
        })
    }

    /// Latest submitted state of `key` that the backend has not staged yet.
    pub fn pending_view(&self, key: &str) -> Option<PendingView> {
        self.unstaged.lock().view(key)
    }

    /// Ops submitted but not yet staged on the backend.
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Waits until every op submitted before this call is committed.
    pub async fn flush(&self) -> StorageResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(WriterMessage::Flush(ack_tx))
            .map_err(|_| StorageError::WriterClosed)?;
        ack_rx.await.map_err(|_| StorageError::WriterClosed)
    }

    /// Drains the queue, commits, and joins the task. Later calls return default stats.
    pub async fn shutdown(&self) -> StorageResult<WriterStats> {
        let _ = self.tx.send(WriterMessage::Shutdown);
        let task = self.task.lock().take();
        match task {
            Some(handle) => handle.await.map_err(|e| StorageError::WriteFailed {
                key: String::new(),
                reason: format!("writer task failed: {e}"),
            }),
            None => Ok(WriterStats::default()),
        }
    }
}

struct WriterLoop {
    backend: Arc<dyn RecordBackend>,
    policy: CommitPolicy,
    queued: Arc<AtomicUsize>,
    unstaged: Arc<Mutex<Unstaged>>,
    uncommitted: usize,
    deadline: Option<Instant>,
    stats: WriterStats,
}

impl WriterLoop {
    fn stage(&mut self, seq: u64, op: WriteOp) {
        self.stats.ops += 1;
        if let Err(e) = self.backend.stage(op.clone()) {
            warn!(op = op.kind(), key = ?op.key(), error = %e, "Failed to stage write");
        }
        self.unstaged.lock().release(seq, &op);
        self.queued.fetch_sub(1, Ordering::AcqRel);

        self.uncommitted += 1;
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.policy.max_delay);
        }
    }

    async fn commit(&mut self) {
        self.deadline = None;
        if self.uncommitted == 0 {
            return;
        }
        let batch = std::mem::take(&mut self.uncommitted);

        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.commit()).await {
            Ok(commit) => {
                debug!(
                    batch,
                    applied = commit.applied,
                    failed = commit.failed,
                    "Committed writes"
                );
                self.stats.absorb(commit);
            }
            Err(e) => {
                error!(batch, error = %e, "Commit task panicked");
                self.stats.failed += batch;
            }
        }
    }
}

async fn run(mut state: WriterLoop, mut rx: mpsc::UnboundedReceiver<WriterMessage>) -> WriterStats {
    loop {
        let msg = match state.deadline {
            Some(deadline) => {
                tokio::select! {
                    msg = rx.recv() => msg,
                    _ = tokio::time::sleep_until(deadline) => {
                        state.commit().await;
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match msg {
            Some(WriterMessage::Op { seq, op }) => {
                state.stage(seq, op);
                if state.uncommitted >= state.policy.max_pending {
                    state.commit().await;
                }
            }
            Some(WriterMessage::Flush(ack)) => {
                state.commit().await;
                let _ = ack.send(());
            }
            Some(WriterMessage::Shutdown) | None => {
                rx.close();
                let mut acks = Vec::new();
                while let Ok(msg) = rx.try_recv() {
                    match msg {
                        WriterMessage::Op { seq, op } => state.stage(seq, op),
                        WriterMessage::Flush(ack) => acks.push(ack),
                        WriterMessage::Shutdown => {}
                    }
                }
                state.commit().await;
                for ack in acks {
                    let _ = ack.send(());
                }
                break;
            }
        }
    }

    info!(
        ops = state.stats.ops,
        commits = state.stats.commits,
        failed = state.stats.failed,
        "Record writer stopped"
    );
    state.stats
}
