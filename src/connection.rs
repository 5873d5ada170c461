use std::sync::Arc;

use crate::codec::Codecs;
use crate::engine::EngineSession;
use crate::error::SqlBridgeError;
use crate::lob::LobStore;
use crate::statement::Statement;
use crate::worker::WorkerHandle;

/// An async connection over a blocking engine session.
///
/// The session moves onto a dedicated worker thread at connect time; this
/// handle and every [`Statement`] created from it talk to that thread over
/// a channel. The codec registry is built per connection: large-object
/// codecs need the connection's own store to stream against.
#[derive(Debug)]
pub struct BridgeConnection {
    handle: Arc<WorkerHandle>,
    codecs: Arc<Codecs>,
}

impl BridgeConnection {
    /// Takes ownership of `session` and spawns its worker thread.
    ///
    /// # Errors
    ///
    /// `ConnectionError` when the thread cannot be spawned.
    pub fn connect<S: EngineSession>(session: S) -> Result<Self, SqlBridgeError> {
        let handle = Arc::new(WorkerHandle::spawn(session)?);
        let store: Arc<dyn LobStore> = Arc::clone(&handle) as Arc<dyn LobStore>;
        let codecs = Arc::new(Codecs::standard(store));
        Ok(Self { handle, codecs })
    }

    /// A new statement for `sql`. Nothing runs until
    /// [`Statement::execute`] and the returned stream is polled.
    #[must_use]
    pub fn statement(&self, sql: impl Into<String>) -> Statement {
        Statement::new(Arc::clone(&self.handle), Arc::clone(&self.codecs), sql)
    }

    /// Turns auto-commit off; the next statement opens a transaction.
    ///
    /// # Errors
    ///
    /// Engine or worker failures.
    pub async fn begin_transaction(&self) -> Result<(), SqlBridgeError> {
        self.handle.set_auto_commit(false).await
    }

    /// Commits the open transaction. Without one this is a no-op.
    ///
    /// # Errors
    ///
    /// Engine or worker failures.
    pub async fn commit(&self) -> Result<(), SqlBridgeError> {
        if self.handle.in_transaction().await? {
            self.run("COMMIT").await
        } else {
            tracing::debug!("no transaction in progress; commit skipped");
            Ok(())
        }
    }

    /// Rolls back the open transaction. Without one this is a no-op.
    ///
    /// # Errors
    ///
    /// Engine or worker failures.
    pub async fn rollback(&self) -> Result<(), SqlBridgeError> {
        if self.handle.in_transaction().await? {
            self.run("ROLLBACK").await
        } else {
            tracing::debug!("no transaction in progress; rollback skipped");
            Ok(())
        }
    }

    /// Whether a transaction is open on the session.
    ///
    /// # Errors
    ///
    /// Engine or worker failures.
    pub async fn in_transaction(&self) -> Result<bool, SqlBridgeError> {
        self.handle.in_transaction().await
    }

    /// Sets the session's auto-commit mode. Turning it back on commits any
    /// open transaction.
    ///
    /// # Errors
    ///
    /// Engine or worker failures.
    pub async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), SqlBridgeError> {
        self.handle.set_auto_commit(auto_commit).await
    }

    /// Closes the session and releases its cursors and temporary large
    /// objects. Statements still holding the worker fail from here on.
    ///
    /// # Errors
    ///
    /// The engine's close failure, if any.
    pub async fn close(self) -> Result<(), SqlBridgeError> {
        self.handle.close().await
    }

    async fn run(&self, sql: &str) -> Result<(), SqlBridgeError> {
        let mut results = self.statement(sql).execute();
        while results.try_next().await?.is_some() {}
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
impl BridgeConnection {
    /// Connects to a SQLite database file, creating it if missing.
    ///
    /// # Errors
    ///
    /// Engine open failures or worker spawn failures.
    pub fn open_sqlite(path: impl AsRef<std::path::Path>) -> Result<Self, SqlBridgeError> {
        Self::connect(crate::sqlite::SqliteSession::open(path)?)
    }

    /// Connects to a fresh in-memory SQLite database.
    ///
    /// # Errors
    ///
    /// Engine open failures or worker spawn failures.
    pub fn open_sqlite_in_memory() -> Result<Self, SqlBridgeError> {
        Self::connect(crate::sqlite::SqliteSession::open_in_memory()?)
    }
}
