use tokio::sync::oneshot;

use crate::binding::Binding;
use crate::engine::{ColumnDescriptor, GeneratedColumns, LobKind, LobRef, LobSource, UpdateOutcome};
use crate::error::SqlBridgeError;
use crate::lob::sink::ChunkReader;
use crate::value::EngineValue;

pub(super) type Reply<T> = oneshot::Sender<Result<T, SqlBridgeError>>;

/// What one statement execution produced on the worker side.
#[derive(Debug)]
pub(crate) enum ExecuteOutcome {
    /// A cursor is now open on the worker; rows are pulled with
    /// [`Request::FetchRow`] until `None`.
    Query {
        cursor_id: u64,
        columns: Vec<ColumnDescriptor>,
    },
    Update(UpdateOutcome),
}

/// Requests the async side sends to the worker thread. Values crossing here
/// are already encoded, so the channel never carries a session type.
pub(super) enum Request {
    Execute {
        sql: String,
        binding: Binding,
        generated: GeneratedColumns,
        respond_to: Reply<ExecuteOutcome>,
    },
    FetchRow {
        cursor_id: u64,
        respond_to: Reply<Option<Vec<EngineValue>>>,
    },
    /// No reply; sent from `Drop`, where nothing can await one.
    CloseCursor {
        cursor_id: u64,
    },
    CreateLob {
        kind: LobKind,
        data: ChunkReader,
        known_len: Option<u64>,
        respond_to: Reply<LobRef>,
    },
    OpenLobSource {
        lob: LobRef,
        respond_to: Reply<Box<dyn LobSource>>,
    },
    SetAutoCommit {
        auto_commit: bool,
        respond_to: Reply<()>,
    },
    InTransaction {
        respond_to: Reply<bool>,
    },
    Close {
        respond_to: Reply<()>,
    },
    Shutdown,
}
