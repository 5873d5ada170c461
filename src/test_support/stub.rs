use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::{
    ColumnDescriptor, EngineCommand, EngineCursor, EngineSession, GeneratedColumns, GeneratedRows,
    LobKind, LobRef, LobSource, UpdateOutcome,
};
use crate::error::{EngineError, EngineErrorKind};
use crate::value::EngineValue;

/// One command the bridge sent to the stub, as the engine saw it.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub sql: String,
    /// Position and encoded value, in bind-call order.
    pub bound: Vec<(usize, EngineValue)>,
    /// The generated-keys request; `None` when the command ran as a query.
    pub generated: Option<GeneratedColumns>,
}

#[derive(Debug, Clone)]
enum StubOutcome {
    Rows {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<EngineValue>>,
    },
    Update {
        rows_affected: u64,
        keys: Option<GeneratedRows>,
    },
    Fail(EngineError),
}

#[derive(Debug)]
struct StubRule {
    sql: String,
    outcome: StubOutcome,
}

#[derive(Debug, Default)]
struct StubState {
    rules: Vec<StubRule>,
    commands: Vec<RecordedCommand>,
    lobs: HashMap<u64, Vec<u8>>,
    next_lob_id: u64,
    temporaries: Vec<u64>,
    auto_commit: bool,
    cursor_closes: usize,
    source_closes: usize,
    session_closed: bool,
}

/// Scripted engine session: each prepared SQL string must have a rule, and
/// every command, bound value and lifecycle call is recorded for assertion
/// through a [`StubHandle`].
pub struct StubSession {
    shared: Arc<Mutex<StubState>>,
}

impl StubSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(StubState {
                next_lob_id: 1,
                auto_commit: true,
                ..StubState::default()
            })),
        }
    }

    /// Assertion handle that stays usable after the session moves onto the
    /// worker thread.
    #[must_use]
    pub fn handle(&self) -> StubHandle {
        StubHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Scripts `sql` to produce rows.
    pub fn on_query(
        &self,
        sql: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<EngineValue>>,
    ) -> &Self {
        self.push_rule(sql, StubOutcome::Rows { columns, rows })
    }

    /// Scripts `sql` to run as an update with no generated keys.
    pub fn on_update(&self, sql: impl Into<String>, rows_affected: u64) -> &Self {
        self.push_rule(
            sql,
            StubOutcome::Update {
                rows_affected,
                keys: None,
            },
        )
    }

    /// Scripts `sql` as an update with a generated-keys template. The
    /// executed request filters the template: all columns, a named subset in
    /// request order, or nothing.
    pub fn on_update_with_keys(
        &self,
        sql: impl Into<String>,
        rows_affected: u64,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<EngineValue>>,
    ) -> &Self {
        self.push_rule(
            sql,
            StubOutcome::Update {
                rows_affected,
                keys: Some(GeneratedRows { columns, rows }),
            },
        )
    }

    /// Scripts `sql` to fail with `error`.
    pub fn on_error(&self, sql: impl Into<String>, error: EngineError) -> &Self {
        self.push_rule(sql, StubOutcome::Fail(error))
    }

    fn push_rule(&self, sql: impl Into<String>, outcome: StubOutcome) -> &Self {
        self.state().rules.push(StubRule {
            sql: sql.into(),
            outcome,
        });
        self
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.shared.lock().expect("stub state poisoned")
    }
}

impl Default for StubSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to everything a [`StubSession`] recorded.
#[derive(Clone)]
pub struct StubHandle {
    shared: Arc<Mutex<StubState>>,
}

impl StubHandle {
    #[must_use]
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state().commands.clone()
    }

    #[must_use]
    pub fn cursor_closes(&self) -> usize {
        self.state().cursor_closes
    }

    #[must_use]
    pub fn source_closes(&self) -> usize {
        self.state().source_closes
    }

    /// IDs registered as temporary large objects, in registration order.
    #[must_use]
    pub fn temporary_lobs(&self) -> Vec<u64> {
        self.state().temporaries.clone()
    }

    /// Content the stub holds for a created large object.
    #[must_use]
    pub fn lob_bytes(&self, id: u64) -> Option<Vec<u8>> {
        self.state().lobs.get(&id).cloned()
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.state().auto_commit
    }

    #[must_use]
    pub fn session_closed(&self) -> bool {
        self.state().session_closed
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.shared.lock().expect("stub state poisoned")
    }
}

impl EngineSession for StubSession {
    type Command<'s>
        = StubCommand
    where
        Self: 's;
    type Cursor = StubCursor;

    fn prepare(&mut self, sql: &str) -> Result<Self::Command<'_>, EngineError> {
        let outcome = self
            .state()
            .rules
            .iter()
            .find(|rule| rule.sql == sql)
            .map(|rule| rule.outcome.clone())
            .ok_or_else(|| {
                EngineError::new(
                    EngineErrorKind::BadGrammar,
                    0,
                    "HY000",
                    format!("no scripted outcome for '{sql}'"),
                )
            })?;
        Ok(StubCommand {
            shared: Arc::clone(&self.shared),
            sql: sql.to_owned(),
            outcome,
            bound: Vec::new(),
        })
    }

    fn create_blob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        self.store_lob(LobKind::Binary, data, known_len)
    }

    fn create_clob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        self.store_lob(LobKind::Character, data, known_len)
    }

    fn add_temporary_lob(&mut self, lob: &LobRef) {
        self.state().temporaries.push(lob.id);
    }

    fn open_lob_source(&mut self, lob: &LobRef) -> Result<Box<dyn LobSource>, EngineError> {
        let bytes = self.state().lobs.get(&lob.id).cloned().ok_or_else(|| {
            EngineError::general(format!("unknown large object handle {}", lob.id))
        })?;
        Ok(Box::new(StubLobSource {
            shared: Arc::clone(&self.shared),
            bytes,
            offset: 0,
            closed: false,
        }))
    }

    fn in_transaction(&mut self) -> Result<bool, EngineError> {
        Ok(!self.state().auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), EngineError> {
        self.state().auto_commit = auto_commit;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.state().session_closed = true;
        Ok(())
    }
}

impl StubSession {
    fn store_lob(
        &mut self,
        kind: LobKind,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)
            .map_err(|err| EngineError::general(format!("failed reading large object content: {err}")))?;
        if kind == LobKind::Character {
            std::str::from_utf8(&bytes).map_err(|_| {
                EngineError::general("character large object content is not valid UTF-8")
            })?;
        }
        if let Some(expected) = known_len {
            if expected != bytes.len() as u64 {
                return Err(EngineError::general(format!(
                    "large object announced {expected} bytes but delivered {}",
                    bytes.len()
                )));
            }
        }
        let mut state = self.state();
        let id = state.next_lob_id;
        state.next_lob_id += 1;
        let length = bytes.len() as u64;
        state.lobs.insert(id, bytes);
        Ok(LobRef {
            id,
            kind,
            length: Some(length),
        })
    }
}

/// Prepared stub command: carries its scripted outcome and records binds.
pub struct StubCommand {
    shared: Arc<Mutex<StubState>>,
    sql: String,
    outcome: StubOutcome,
    bound: Vec<(usize, EngineValue)>,
}

impl EngineCommand for StubCommand {
    type Cursor = StubCursor;

    fn is_query(&self) -> bool {
        matches!(self.outcome, StubOutcome::Rows { .. })
    }

    fn parameter_count(&self) -> usize {
        self.sql
            .bytes()
            .filter(|byte| matches!(byte, b'?' | b'$'))
            .count()
    }

    fn bind(&mut self, position: usize, value: EngineValue) -> Result<(), EngineError> {
        self.bound.push((position, value));
        Ok(())
    }

    fn execute_query(
        self,
        _max_rows: Option<u64>,
        _scrollable: bool,
    ) -> Result<StubCursor, EngineError> {
        let Self {
            shared,
            sql,
            outcome,
            bound,
        } = self;
        shared
            .lock()
            .expect("stub state poisoned")
            .commands
            .push(RecordedCommand {
                sql: sql.clone(),
                bound,
                generated: None,
            });
        match outcome {
            StubOutcome::Rows { columns, rows } => Ok(StubCursor {
                shared,
                columns,
                rows: rows.into_iter(),
                closed: false,
            }),
            StubOutcome::Fail(err) => Err(err),
            StubOutcome::Update { .. } => {
                Err(EngineError::general(format!("'{sql}' is scripted as an update")))
            }
        }
    }

    fn execute_update(self, generated: &GeneratedColumns) -> Result<UpdateOutcome, EngineError> {
        let Self {
            shared,
            sql,
            outcome,
            bound,
        } = self;
        shared
            .lock()
            .expect("stub state poisoned")
            .commands
            .push(RecordedCommand {
                sql: sql.clone(),
                bound,
                generated: Some(generated.clone()),
            });
        match outcome {
            StubOutcome::Update {
                rows_affected,
                keys,
            } => Ok(UpdateOutcome {
                rows_affected,
                generated: filter_keys(keys, generated)?,
            }),
            StubOutcome::Fail(err) => Err(err),
            StubOutcome::Rows { .. } => {
                Err(EngineError::general(format!("'{sql}' is scripted as a query")))
            }
        }
    }
}

fn filter_keys(
    template: Option<GeneratedRows>,
    request: &GeneratedColumns,
) -> Result<Option<GeneratedRows>, EngineError> {
    let Some(template) = template else {
        return Ok(None);
    };
    match request {
        GeneratedColumns::None => Ok(None),
        GeneratedColumns::All => Ok(Some(template)),
        GeneratedColumns::Named(names) => {
            let mut indexes = Vec::with_capacity(names.len());
            for name in names {
                let index = template
                    .columns
                    .iter()
                    .position(|column| column.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        EngineError::general(format!("no generated column named '{name}'"))
                    })?;
                indexes.push(index);
            }
            let columns = indexes
                .iter()
                .map(|&index| template.columns[index].clone())
                .collect();
            let rows = template
                .rows
                .iter()
                .map(|row| {
                    indexes
                        .iter()
                        .map(|&index| row.get(index).cloned().unwrap_or(EngineValue::Null))
                        .collect()
                })
                .collect();
            Ok(Some(GeneratedRows { columns, rows }))
        }
    }
}

/// Close-counting cursor over scripted rows.
pub struct StubCursor {
    shared: Arc<Mutex<StubState>>,
    columns: Vec<ColumnDescriptor>,
    rows: std::vec::IntoIter<Vec<EngineValue>>,
    closed: bool,
}

impl EngineCursor for StubCursor {
    fn descriptor(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<EngineValue>>, EngineError> {
        Ok(self.rows.next())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.lock().expect("stub state poisoned").cursor_closes += 1;
        }
    }
}

struct StubLobSource {
    shared: Arc<Mutex<StubState>>,
    bytes: Vec<u8>,
    offset: usize,
    closed: bool,
}

impl LobSource for StubLobSource {
    fn read_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, EngineError> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }
        let end = self.bytes.len().min(self.offset + max_len.max(1));
        let chunk = self.bytes[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(chunk))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.lock().expect("stub state poisoned").source_closes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeTag;

    fn template() -> GeneratedRows {
        GeneratedRows {
            columns: vec![
                ColumnDescriptor::new("id", TypeTag::BigInt),
                ColumnDescriptor::new("created", TypeTag::Timestamp),
            ],
            rows: vec![vec![
                EngineValue::BigInt(7),
                EngineValue::Text("2024-05-17 10:30:00".into()),
            ]],
        }
    }

    #[test]
    fn named_filter_keeps_request_order() {
        let filtered = filter_keys(
            Some(template()),
            &GeneratedColumns::Named(vec!["created".into(), "id".into()]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(filtered.columns[0].name, "created");
        assert_eq!(filtered.columns[1].name, "id");
        assert_eq!(
            filtered.rows[0],
            vec![
                EngineValue::Text("2024-05-17 10:30:00".into()),
                EngineValue::BigInt(7)
            ]
        );
    }

    #[test]
    fn unknown_named_column_fails() {
        let err = filter_keys(
            Some(template()),
            &GeneratedColumns::Named(vec!["missing".into()]),
        )
        .unwrap_err();
        assert!(err.message.contains("missing"), "{err}");
    }

    #[test]
    fn none_request_drops_the_template() {
        assert_eq!(filter_keys(Some(template()), &GeneratedColumns::None).unwrap(), None);
    }
}
