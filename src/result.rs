use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::{Stream, TryStreamExt};

use crate::codec::Codecs;
use crate::engine::UpdateOutcome;
use crate::error::SqlBridgeError;
use crate::row::{Row, RowMetadata};
use crate::worker::WorkerHandle;

/// Lazily-fetched rows of one query. Each pull is one worker round-trip;
/// dropping the stream early releases the native cursor.
pub struct RowStream {
    handle: Arc<WorkerHandle>,
    codecs: Arc<Codecs>,
    metadata: Arc<RowMetadata>,
    cursor_id: u64,
    done: bool,
}

impl RowStream {
    pub(crate) fn new(
        handle: Arc<WorkerHandle>,
        codecs: Arc<Codecs>,
        metadata: Arc<RowMetadata>,
        cursor_id: u64,
    ) -> Self {
        Self {
            handle,
            codecs,
            metadata,
            cursor_id,
            done: false,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    /// Fetches the next row; `None` once the cursor is exhausted. After an
    /// error or exhaustion the stream stays finished.
    ///
    /// # Errors
    ///
    /// Engine failures mid-iteration surface here; the native cursor is
    /// already released when they do.
    pub async fn try_next(&mut self) -> Result<Option<Row>, SqlBridgeError> {
        if self.done {
            return Ok(None);
        }
        match self.handle.fetch_row(self.cursor_id).await {
            Ok(Some(values)) => Ok(Some(Row::new(
                values,
                Arc::clone(&self.metadata),
                Arc::clone(&self.codecs),
            ))),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    /// Collects every remaining row.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first fetch failure.
    pub async fn collect_rows(mut self) -> Result<Vec<Row>, SqlBridgeError> {
        let mut rows = Vec::new();
        while let Some(row) = self.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The rows as a [`Stream`], for combinator-style consumption.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Row, SqlBridgeError>> + Send {
        try_stream! {
            while let Some(row) = self.try_next().await? {
                yield row;
            }
        }
    }
}

impl fmt::Debug for RowStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("cursor_id", &self.cursor_id)
            .field("columns", &self.metadata.len())
            .field("done", &self.done)
            .finish()
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        // Exhausted or failed cursors are already gone on the worker side.
        if !self.done {
            self.handle.close_cursor(self.cursor_id);
        }
    }
}

/// Generated-key rows reported by an update, with their own metadata.
#[derive(Debug)]
pub struct GeneratedKeys {
    metadata: Arc<RowMetadata>,
    rows: Vec<Row>,
}

impl GeneratedKeys {
    #[must_use]
    pub fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Outcome of one non-query sub-statement.
#[derive(Debug)]
pub struct UpdateResult {
    rows_affected: u64,
    generated: Option<GeneratedKeys>,
}

impl UpdateResult {
    pub(crate) fn from_outcome(outcome: UpdateOutcome, codecs: &Arc<Codecs>) -> Self {
        let generated = outcome.generated.map(|keys| {
            let metadata = Arc::new(RowMetadata::from_descriptors(keys.columns, codecs));
            let rows = keys
                .rows
                .into_iter()
                .map(|values| Row::new(values, Arc::clone(&metadata), Arc::clone(codecs)))
                .collect();
            GeneratedKeys { metadata, rows }
        });
        Self {
            rows_affected: outcome.rows_affected,
            generated,
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Present only when the statement asked for generated keys.
    #[must_use]
    pub fn generated_keys(&self) -> Option<&GeneratedKeys> {
        self.generated.as_ref()
    }

    #[must_use]
    pub fn into_generated_keys(self) -> Option<GeneratedKeys> {
        self.generated
    }
}

/// One sub-statement's result: a row stream or an update count.
#[derive(Debug)]
pub enum SqlResult {
    Query(RowStream),
    Update(UpdateResult),
}

impl SqlResult {
    /// The affected-row count, when this is an update result.
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::Query(_) => None,
            Self::Update(update) => Some(update.rows_affected()),
        }
    }
}

/// Results of one execution, in sub-statement and binding order.
///
/// The stream is lazy: a sub-statement only runs once its result is polled,
/// and dropping the stream stops everything not yet started. The first
/// failure ends the stream.
pub struct ResultStream {
    inner: BoxStream<'static, Result<SqlResult, SqlBridgeError>>,
}

impl ResultStream {
    pub(crate) fn new(inner: BoxStream<'static, Result<SqlResult, SqlBridgeError>>) -> Self {
        Self { inner }
    }

    /// The next result, `None` after the last sub-statement.
    ///
    /// # Errors
    ///
    /// The first sub-statement failure; nothing after it executes.
    pub async fn try_next(&mut self) -> Result<Option<SqlResult>, SqlBridgeError> {
        self.inner.try_next().await
    }

    /// Consumes the first result as a row stream. Anything after it is not
    /// executed.
    ///
    /// # Errors
    ///
    /// `ConversionError` when the statement produced no result or an update
    /// count instead of rows.
    pub async fn into_rows(mut self) -> Result<RowStream, SqlBridgeError> {
        match self.try_next().await? {
            Some(SqlResult::Query(rows)) => Ok(rows),
            Some(SqlResult::Update(_)) => Err(SqlBridgeError::ConversionError(
                "statement produced an update count, not rows".into(),
            )),
            None => Err(SqlBridgeError::ConversionError(
                "statement produced no result".into(),
            )),
        }
    }

    /// Consumes the first result as an update. Anything after it is not
    /// executed.
    ///
    /// # Errors
    ///
    /// `ConversionError` when the statement produced no result or rows
    /// instead of an update count.
    pub async fn into_update(mut self) -> Result<UpdateResult, SqlBridgeError> {
        match self.try_next().await? {
            Some(SqlResult::Update(update)) => Ok(update),
            Some(SqlResult::Query(_)) => Err(SqlBridgeError::ConversionError(
                "statement produced rows, not an update count".into(),
            )),
            None => Err(SqlBridgeError::ConversionError(
                "statement produced no result".into(),
            )),
        }
    }

    /// Runs every sub-statement and sums the affected-row counts. Query
    /// results contribute nothing; their cursors are released unread.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failure.
    pub async fn total_rows_affected(mut self) -> Result<u64, SqlBridgeError> {
        let mut total = 0;
        while let Some(result) = self.try_next().await? {
            total += result.rows_affected().unwrap_or(0);
        }
        Ok(total)
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream").finish_non_exhaustive()
    }
}

impl Stream for ResultStream {
    type Item = Result<SqlResult, SqlBridgeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
