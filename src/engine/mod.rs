//! Traits the embedded engine is driven through.
//!
//! The crate never parses, plans, or stores anything itself; a session
//! implementation wraps the engine's synchronous API behind these traits and
//! the worker thread owns the session for its whole life. Everything here
//! blocks, and only ever runs on a worker or reader thread.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::{EngineValue, TypeTag};

/// One column of a native result descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub tag: TypeTag,
    /// `None` when the engine cannot tell.
    pub nullable: Option<bool>,
    pub precision: Option<u64>,
    pub scale: Option<u32>,
}

impl ColumnDescriptor {
    /// Descriptor with only a name and tag, everything else unknown.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
            nullable: None,
            precision: None,
            scale: None,
        }
    }
}

/// Which generated keys an update should report back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeneratedColumns {
    /// None requested; the engine skips key retrieval entirely.
    #[default]
    None,
    /// Every generated column.
    All,
    /// Exactly the named columns, in this order.
    Named(Vec<String>),
}

impl GeneratedColumns {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Generated-key rows returned by an update, with their own descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRows {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<EngineValue>>,
}

/// Result of a non-query execution.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub rows_affected: u64,
    pub generated: Option<GeneratedRows>,
}

/// Whether a large object holds bytes or characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobKind {
    Binary,
    Character,
}

/// Opaque handle to an engine-side large object. Only meaningful to the
/// session that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LobRef {
    pub id: u64,
    pub kind: LobKind,
    /// Content length in bytes, when the engine knows it.
    pub length: Option<u64>,
}

/// Blocking pull source over one large object's content.
///
/// Handed out by [`EngineSession::open_lob_source`] and then owned by a
/// dedicated reader thread; `close` is called exactly once on every
/// termination path.
pub trait LobSource: Send {
    /// Reads the next chunk, at most `max_len` bytes. `None` means end of
    /// content. Character content arrives as UTF-8 bytes with no alignment
    /// guarantee at chunk boundaries.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine fails to produce the next chunk.
    fn read_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, EngineError>;

    /// Releases the underlying engine resources.
    fn close(&mut self);
}

/// A prepared native command, borrowed from its session.
pub trait EngineCommand {
    type Cursor: EngineCursor;

    /// True when execution will produce a row set rather than a count.
    fn is_query(&self) -> bool;

    /// Number of parameter slots the engine found in the statement text.
    fn parameter_count(&self) -> usize;

    /// Applies one encoded value to a zero-based parameter slot.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` for out-of-range positions or values the engine
    /// rejects.
    fn bind(&mut self, position: usize, value: EngineValue) -> Result<(), EngineError>;

    /// Runs the command as a query. `max_rows` of `None` means unlimited;
    /// `scrollable` is a hint sessions may ignore.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when execution fails.
    fn execute_query(
        self,
        max_rows: Option<u64>,
        scrollable: bool,
    ) -> Result<Self::Cursor, EngineError>;

    /// Runs the command as an update, optionally collecting generated keys.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when execution fails.
    fn execute_update(self, generated: &GeneratedColumns) -> Result<UpdateOutcome, EngineError>;
}

/// Forward-only cursor over a query result. Owned, so the worker can keep it
/// open across fetches while the session prepares further commands.
pub trait EngineCursor {
    fn descriptor(&self) -> &[ColumnDescriptor];

    /// Fetches the next row; `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine fails mid-iteration.
    fn next_row(&mut self) -> Result<Option<Vec<EngineValue>>, EngineError>;

    /// Releases the native cursor. Subsequent calls are no-ops.
    fn close(&mut self);
}

/// One live engine session, owned by one worker thread.
pub trait EngineSession: Send + 'static {
    type Command<'s>: EngineCommand<Cursor = Self::Cursor>
    where
        Self: 's;
    type Cursor: EngineCursor;

    /// Prepares one statement. The text contains no `;` separators by the
    /// time it reaches the session.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` (typically `BadGrammar`) when parsing fails.
    fn prepare(&mut self, sql: &str) -> Result<Self::Command<'_>, EngineError>;

    /// Creates an engine-side binary large object by draining `data`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine cannot store the content or the
    /// reader fails.
    fn create_blob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError>;

    /// Creates an engine-side character large object from UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine cannot store the content or the
    /// reader fails.
    fn create_clob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError>;

    /// Marks a created large object as temporary so the session releases it
    /// when it closes.
    fn add_temporary_lob(&mut self, lob: &LobRef);

    /// Opens a blocking source over an engine-side large object.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the reference is unknown or stale.
    fn open_lob_source(&mut self, lob: &LobRef) -> Result<Box<dyn LobSource>, EngineError>;

    /// Whether a transaction is currently open.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine cannot report its state.
    fn in_transaction(&mut self) -> Result<bool, EngineError>;

    /// Switches auto-commit. Turning it on while a transaction is open
    /// commits that transaction.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the mode switch fails.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), EngineError>;

    /// Releases session resources, including temporary large objects. The
    /// session is dropped right after.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when cleanup fails; the session is dropped
    /// regardless.
    fn close(&mut self) -> Result<(), EngineError>;
}
