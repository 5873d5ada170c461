use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::binding::Binding;
use crate::engine::{EngineSession, GeneratedColumns, LobKind, LobRef, LobSource};
use crate::error::SqlBridgeError;
use crate::lob::LobStore;
use crate::lob::sink::ChunkReader;
use crate::value::EngineValue;

use super::channel::{ExecuteOutcome, Request};
use super::dispatcher::run_worker;

static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Async handle to the thread that owns an engine session.
///
/// The handle is session-type-erased: everything crossing the channel is
/// already encoded. It is shared through [`Arc`](std::sync::Arc) between the
/// connection, open row streams, and engine-backed large-object handles, and
/// the worker shuts down when the last of them drops.
pub(crate) struct WorkerHandle {
    sender: Sender<Request>,
    worker_id: u64,
}

impl WorkerHandle {
    /// Moves `session` onto a fresh worker thread and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the thread cannot be spawned.
    ///
    /// The worker thread must never observe an ambient async runtime: large
    /// object uploads block on a channel from inside `io::Read`.
    pub(crate) fn spawn<S: EngineSession>(session: S) -> Result<Self, SqlBridgeError> {
        let (sender, receiver) = mpsc::channel::<Request>();
        let worker_id = WORKER_SEQ.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("engine-worker-{worker_id}"))
            .spawn(move || run_worker(session, &receiver))
            .map_err(|err| {
                SqlBridgeError::ConnectionError(format!(
                    "failed to spawn engine worker thread: {err}"
                ))
            })?;
        tracing::debug!(worker_id, "spawned engine worker");
        Ok(Self { sender, worker_id })
    }

    fn send_request(&self, request: Request) -> Result<(), SqlBridgeError> {
        self.sender
            .send(request)
            .map_err(|_| connection_error("engine worker closed"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SqlBridgeError>>) -> Request,
        drop_message: &'static str,
    ) -> Result<T, SqlBridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(build(tx))?;
        rx.await.map_err(|_| connection_error(drop_message))?
    }

    pub(crate) async fn execute(
        &self,
        sql: String,
        binding: Binding,
        generated: GeneratedColumns,
    ) -> Result<ExecuteOutcome, SqlBridgeError> {
        self.request(
            |respond_to| Request::Execute {
                sql,
                binding,
                generated,
                respond_to,
            },
            "engine worker dropped while executing statement",
        )
        .await
    }

    pub(crate) async fn fetch_row(
        &self,
        cursor_id: u64,
    ) -> Result<Option<Vec<EngineValue>>, SqlBridgeError> {
        self.request(
            |respond_to| Request::FetchRow {
                cursor_id,
                respond_to,
            },
            "engine worker dropped while fetching row",
        )
        .await
    }

    /// Fire-and-forget cursor release, callable from `Drop`. A failed send
    /// means the worker already exited and took its cursors with it.
    pub(crate) fn close_cursor(&self, cursor_id: u64) {
        let _ = self.sender.send(Request::CloseCursor { cursor_id });
    }

    pub(crate) async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), SqlBridgeError> {
        self.request(
            |respond_to| Request::SetAutoCommit {
                auto_commit,
                respond_to,
            },
            "engine worker dropped while switching auto-commit",
        )
        .await
    }

    pub(crate) async fn in_transaction(&self) -> Result<bool, SqlBridgeError> {
        self.request(
            |respond_to| Request::InTransaction { respond_to },
            "engine worker dropped while reading transaction state",
        )
        .await
    }

    /// Closes the session and stops the worker thread. Requests sent after
    /// this fail with `ConnectionError`.
    pub(crate) async fn close(&self) -> Result<(), SqlBridgeError> {
        self.request(
            |respond_to| Request::Close { respond_to },
            "engine worker dropped while closing session",
        )
        .await
    }
}

#[async_trait]
impl LobStore for WorkerHandle {
    async fn create_lob(
        &self,
        kind: LobKind,
        data: ChunkReader,
        known_len: Option<u64>,
    ) -> Result<LobRef, SqlBridgeError> {
        self.request(
            |respond_to| Request::CreateLob {
                kind,
                data,
                known_len,
                respond_to,
            },
            "engine worker dropped while storing large object",
        )
        .await
    }

    async fn open_lob_source(&self, lob: LobRef) -> Result<Box<dyn LobSource>, SqlBridgeError> {
        self.request(
            |respond_to| Request::OpenLobSource { lob, respond_to },
            "engine worker dropped while opening large object",
        )
        .await
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(Request::Shutdown);
    }
}

fn connection_error(message: &str) -> SqlBridgeError {
    SqlBridgeError::ConnectionError(message.into())
}
