/// Board session: drives a `SyncMachine` against a `DocumentStore`.
///
/// One tokio task per open board owns the machine and is its only writer.
/// Requests arrive over a bounded channel and are started one at a time: the
/// next request waits until the previous write settles. Writes run on their
/// own spawned task, so a timed-out write is abandoned, never cancelled.
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::machine::{SyncMachine, WritePlan};
use super::{MutationOutcome, SyncStatus};
use crate::config::SyncSettings;
use crate::error::BoardError;
use crate::mutation::Mutation;
use crate::permissions::{self, Role};
use crate::store::{BoardSubscription, DocumentStore, StoreError};
use crate::types::{now_millis, Board};

type Reply = oneshot::Sender<Result<MutationOutcome, BoardError>>;
type WriteFuture = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send>>;

struct Request {
    mutation: Mutation,
    reply: Reply,
}

struct PendingWrite {
    done: WriteFuture,
    reply: Reply,
    outcome: MutationOutcome,
    ends_session: bool,
}

pub struct BoardSession {
    board_id: String,
    user_id: String,
    requests: mpsc::Sender<Request>,
    board: watch::Receiver<Board>,
    status: watch::Receiver<SyncStatus>,
    queued: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BoardSession {
    /// Subscribe to `board_id` and start the session once the first snapshot arrives.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        board_id: &str,
        user_id: &str,
        settings: &SyncSettings,
    ) -> Result<Self, BoardError> {
        let mut subscription = store.subscribe(board_id).await?;
        let first = match tokio::time::timeout(settings.subscribe_timeout(), subscription.next())
            .await
        {
            Ok(Some(snapshot)) => snapshot?,
            Ok(None) => return Err(StoreError::Disconnected(board_id.to_string()).into()),
            Err(_) => return Err(StoreError::Timeout(settings.subscribe_timeout_ms).into()),
        };
        log::info!(
            "[taskflow.sync] Opened board {} for {} ({})",
            board_id,
            user_id,
            permissions::role(&first, user_id)
        );

        let (requests_tx, requests_rx) = mpsc::channel(settings.queue_capacity());
        let (board_tx, board_rx) = watch::channel(first.clone());
        let (status_tx, status_rx) = watch::channel(SyncStatus {
            connected: true,
            ..Default::default()
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let queued = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            store,
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            machine: SyncMachine::new(first),
            subscription: Some(subscription),
            board_tx,
            status_tx,
            queued: queued.clone(),
            write_timeout: settings.write_timeout(),
            write_timeout_ms: settings.write_timeout_ms,
        };
        let task = tokio::spawn(worker.run(requests_rx, shutdown_rx));

        Ok(Self {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            requests: requests_tx,
            board: board_rx,
            status: status_rx,
            queued,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Submit a mutation and wait until its write settles.
    ///
    /// Validation and permission failures are reported without queueing.
    pub async fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, BoardError> {
        mutation.validate()?;
        permissions::authorize(&self.board.borrow(), &self.user_id, &mutation)?;

        let (reply, response) = oneshot::channel();
        self.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.requests.try_send(Request { mutation, reply }) {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(match err {
                mpsc::error::TrySendError::Full(_) => {
                    BoardError::validation("too many pending requests for this board")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    StoreError::Disconnected(self.board_id.clone()).into()
                }
            });
        }

        response
            .await
            .map_err(|_| BoardError::from(StoreError::Disconnected(self.board_id.clone())))?
    }

    /// Current local board.
    pub fn snapshot(&self) -> Board {
        self.board.borrow().clone()
    }

    pub fn watch_board(&self) -> watch::Receiver<Board> {
        self.board.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    pub fn role(&self) -> Role {
        permissions::role(&self.board.borrow(), &self.user_id)
    }

    /// Stop the session and unsubscribe. A write already issued still lands.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

struct Worker {
    store: Arc<dyn DocumentStore>,
    board_id: String,
    user_id: String,
    machine: SyncMachine,
    subscription: Option<BoardSubscription>,
    board_tx: watch::Sender<Board>,
    status_tx: watch::Sender<SyncStatus>,
    queued: Arc<AtomicUsize>,
    write_timeout: Duration,
    write_timeout_ms: u64,
}

impl Worker {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut writing: Option<PendingWrite> = None;

        loop {
            tokio::select! {
                // Fires on close() and when the session handle is dropped.
                _ = &mut shutdown => break,
                pushed = next_push(&mut self.subscription) => self.on_push(pushed),
                result = write_settled(&mut writing) => {
                    if let Some(write) = writing.take() {
                        if self.on_settled(write, result) {
                            break;
                        }
                    }
                }
                Some(request) = requests.recv(), if writing.is_none() => {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    writing = self.start(request);
                    self.publish_status();
                }
            }
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        log::info!("[taskflow.sync] Closed board {}", self.board_id);
    }

    fn on_push(&mut self, pushed: Option<Result<Board, StoreError>>) {
        match pushed {
            Some(Ok(board)) => {
                if self.machine.on_remote(board) {
                    self.publish_board();
                }
            }
            Some(Err(err)) => {
                log::warn!(
                    "[taskflow.sync] Ignoring bad snapshot for board {}: {}",
                    self.board_id,
                    err
                );
            }
            None => {
                log::warn!(
                    "[taskflow.sync] Subscription to board {} ended",
                    self.board_id
                );
                self.subscription = None;
                self.publish_status();
            }
        }
    }

    /// Begin a request. Returns the write to wait for, if one was issued.
    fn start(&mut self, request: Request) -> Option<PendingWrite> {
        let Request { mutation, reply } = request;
        let begun = match self.machine.begin(&mutation, &self.user_id, now_millis()) {
            Ok(begun) => begun,
            Err(err) => {
                let _ = reply.send(Err(err));
                return None;
            }
        };

        let written_paths = match &begun.plan {
            WritePlan::Patch(update) => update.path_strings(),
            _ => Vec::new(),
        };
        let outcome = MutationOutcome {
            created_id: begun.created_id,
            written_paths,
        };
        if begun.plan.is_noop() {
            let _ = reply.send(Ok(outcome));
            return None;
        }

        self.publish_board();
        let ends_session = matches!(begun.plan, WritePlan::DeleteBoard);
        log::debug!(
            "[taskflow.sync] Writing {} to board {}",
            mutation.name(),
            self.board_id
        );
        Some(PendingWrite {
            done: self.spawn_write(begun.plan),
            reply,
            outcome,
            ends_session,
        })
    }

    fn spawn_write(&self, plan: WritePlan) -> WriteFuture {
        let store = self.store.clone();
        let board_id = self.board_id.clone();
        let handle = tokio::spawn(async move {
            match plan {
                WritePlan::Noop => Ok(()),
                WritePlan::Patch(update) => store.apply_partial_update(&board_id, update).await,
                WritePlan::AddMember(user_id) => store.add_member(&board_id, &user_id).await,
                WritePlan::RemoveMember(user_id) => store.remove_member(&board_id, &user_id).await,
                WritePlan::DeleteBoard => store.delete_board(&board_id).await,
            }
        });

        let limit = self.write_timeout;
        let limit_ms = self.write_timeout_ms;
        Box::pin(async move {
            match tokio::time::timeout(limit, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(StoreError::Network(format!(
                    "write task failed: {}",
                    join_err
                ))),
                Err(_) => Err(StoreError::Timeout(limit_ms)),
            }
        })
    }

    /// Settle a finished write. Returns `true` when the session should end.
    fn on_settled(&mut self, write: PendingWrite, result: Result<(), StoreError>) -> bool {
        let settled = self.machine.settle(result);
        let ok = settled.is_ok();
        if !ok {
            // Rolled back.
            self.publish_board();
        }
        self.publish_status();
        let _ = write.reply.send(settled.map(|()| write.outcome));

        if ok && write.ends_session {
            log::info!("[taskflow.sync] Board {} deleted, ending session", self.board_id);
            return true;
        }
        false
    }

    fn publish_board(&self) {
        self.board_tx.send_replace(self.machine.board().clone());
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SyncStatus {
            state: self.machine.state(),
            queued: self.queued.load(Ordering::SeqCst),
            last_error: self.machine.last_error().map(str::to_string),
            connected: self.subscription.is_some(),
        });
    }
}

async fn next_push(subscription: &mut Option<BoardSubscription>) -> Option<Result<Board, StoreError>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

async fn write_settled(writing: &mut Option<PendingWrite>) -> Result<(), StoreError> {
    match writing {
        Some(write) => (&mut write.done).await,
        None => pending().await,
    }
}
