use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use rusqlite::Connection;
use rusqlite::ffi::ErrorCode;
use rusqlite::types::Value;

use crate::engine::{
    ColumnDescriptor, EngineCommand, EngineCursor, EngineSession, GeneratedColumns, GeneratedRows,
    LobKind, LobRef, LobSource, UpdateOutcome,
};
use crate::error::{EngineError, EngineErrorKind, SqlBridgeError};
use crate::value::{BlobValue, ClobValue, EngineValue, TypeTag};

use super::types::{self, DeclaredType, SQL_STATE};

/// Blocking engine session over one `rusqlite` connection.
///
/// Auto-commit is emulated: SQLite has no session flag, so with auto-commit
/// off the session issues `BEGIN` before the first statement outside a
/// transaction, matching engines where the transaction starts lazily.
/// Large objects live in memory on the session, keyed by handle.
pub struct SqliteSession {
    conn: Connection,
    state: SqliteState,
}

#[derive(Default)]
struct SqliteState {
    lobs: HashMap<u64, Vec<u8>>,
    temporaries: Vec<u64>,
    next_lob_id: u64,
    auto_commit: bool,
}

impl SqliteSession {
    /// Opens a database file, creating it if missing.
    ///
    /// # Errors
    ///
    /// The engine's open failure, classified.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqlBridgeError> {
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        Ok(Self::with_connection(conn))
    }

    /// Opens a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// The engine's open failure, classified.
    pub fn open_in_memory() -> Result<Self, SqlBridgeError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            state: SqliteState {
                next_lob_id: 1,
                auto_commit: true,
                ..SqliteState::default()
            },
        }
    }
}

impl EngineSession for SqliteSession {
    type Command<'s>
        = SqliteCommand<'s>
    where
        Self: 's;
    type Cursor = SqliteCursor;

    fn prepare(&mut self, sql: &str) -> Result<Self::Command<'_>, EngineError> {
        let Self { conn, state } = self;
        let conn: &Connection = conn;
        let state: &SqliteState = state;
        let stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
        let is_insert = sql
            .trim_start()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("INSERT"));
        Ok(SqliteCommand {
            stmt,
            conn,
            state,
            is_insert,
        })
    }

    fn create_blob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        self.state.store_lob(LobKind::Binary, data, known_len)
    }

    fn create_clob(
        &mut self,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        self.state.store_lob(LobKind::Character, data, known_len)
    }

    fn add_temporary_lob(&mut self, lob: &LobRef) {
        self.state.temporaries.push(lob.id);
    }

    fn open_lob_source(&mut self, lob: &LobRef) -> Result<Box<dyn LobSource>, EngineError> {
        let bytes = self.state.lob_bytes(lob)?;
        Ok(Box::new(SqliteLobSource { bytes, offset: 0 }))
    }

    fn in_transaction(&mut self) -> Result<bool, EngineError> {
        Ok(!self.conn.is_autocommit())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), EngineError> {
        if auto_commit && !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT").map_err(map_sqlite_error)?;
        }
        self.state.auto_commit = auto_commit;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if !self.conn.is_autocommit() {
            self.conn
                .execute_batch("ROLLBACK")
                .map_err(map_sqlite_error)?;
        }
        self.state.lobs.clear();
        self.state.temporaries.clear();
        Ok(())
    }
}

impl SqliteState {
    fn store_lob(
        &mut self,
        kind: LobKind,
        data: &mut dyn Read,
        known_len: Option<u64>,
    ) -> Result<LobRef, EngineError> {
        let mut bytes = match known_len.and_then(|len| usize::try_from(len).ok()) {
            Some(len) => Vec::with_capacity(len),
            None => Vec::new(),
        };
        data.read_to_end(&mut bytes)
            .map_err(|err| EngineError::general(format!("failed reading large object content: {err}")))?;
        if kind == LobKind::Character {
            std::str::from_utf8(&bytes).map_err(|_| {
                EngineError::general("character large object content is not valid UTF-8")
            })?;
        }
        let id = self.next_lob_id;
        self.next_lob_id += 1;
        let length = bytes.len() as u64;
        self.lobs.insert(id, bytes);
        Ok(LobRef {
            id,
            kind,
            length: Some(length),
        })
    }

    fn lob_bytes(&self, lob: &LobRef) -> Result<Vec<u8>, EngineError> {
        self.lobs.get(&lob.id).cloned().ok_or_else(|| {
            EngineError::general(format!("unknown large object handle {}", lob.id))
        })
    }
}

/// One prepared statement, borrowing the session's connection and state.
pub struct SqliteCommand<'s> {
    stmt: rusqlite::Statement<'s>,
    conn: &'s Connection,
    state: &'s SqliteState,
    is_insert: bool,
}

impl EngineCommand for SqliteCommand<'_> {
    type Cursor = SqliteCursor;

    fn is_query(&self) -> bool {
        self.stmt.column_count() > 0
    }

    fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    fn bind(&mut self, position: usize, value: EngineValue) -> Result<(), EngineError> {
        let value = match value {
            EngineValue::Blob(BlobValue::Ref(lob)) => Value::Blob(self.state.lob_bytes(&lob)?),
            EngineValue::Clob(ClobValue::Ref(lob)) => {
                let bytes = self.state.lob_bytes(&lob)?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    EngineError::general("character large object content is not valid UTF-8")
                })?;
                Value::Text(text)
            }
            other => types::to_sqlite_value(other)?,
        };
        self.stmt
            .raw_bind_parameter(position + 1, value)
            .map_err(map_sqlite_error)
    }

    fn execute_query(
        mut self,
        max_rows: Option<u64>,
        _scrollable: bool,
    ) -> Result<SqliteCursor, EngineError> {
        ensure_transaction(self.conn, self.state)?;
        let declared: Vec<(String, Option<DeclaredType>)> = self
            .stmt
            .columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_owned(),
                    column.decl_type().and_then(types::parse_decl),
                )
            })
            .collect();
        let column_count = declared.len();

        // The native rows borrow the statement; materialise them before the
        // command goes away so the cursor can outlive the session borrow.
        let mut raw_rows: Vec<Vec<Value>> = Vec::new();
        let mut rows = self.stmt.raw_query();
        while let Some(row) = rows.next().map_err(map_sqlite_error)? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(row.get::<_, Value>(index).map_err(map_sqlite_error)?);
            }
            raw_rows.push(values);
            if max_rows.is_some_and(|limit| raw_rows.len() as u64 >= limit) {
                break;
            }
        }
        drop(rows);

        let mut columns = Vec::with_capacity(column_count);
        for (index, (name, decl)) in declared.into_iter().enumerate() {
            let (tag, precision, scale) = match decl {
                Some(decl) => (decl.tag, decl.precision, decl.scale),
                None => (types::infer_tag(&raw_rows, index), None, None),
            };
            columns.push(ColumnDescriptor {
                name,
                tag,
                nullable: None,
                precision,
                scale,
            });
        }

        let mut converted = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let mut row = Vec::with_capacity(column_count);
            for (index, value) in raw.into_iter().enumerate() {
                row.push(types::from_sqlite_value(value, columns[index].tag)?);
            }
            converted.push(row);
        }

        Ok(SqliteCursor {
            columns,
            rows: converted.into_iter(),
        })
    }

    fn execute_update(mut self, generated: &GeneratedColumns) -> Result<UpdateOutcome, EngineError> {
        ensure_transaction(self.conn, self.state)?;
        let changes = self.stmt.raw_execute().map_err(map_sqlite_error)?;
        // SQLite only reports last_insert_rowid; both All and Named narrow
        // to that single column, and only inserts produce it.
        let generated = if generated.is_none() || !self.is_insert {
            None
        } else {
            Some(rowid_row(self.conn))
        };
        Ok(UpdateOutcome {
            rows_affected: changes as u64,
            generated,
        })
    }
}

fn ensure_transaction(conn: &Connection, state: &SqliteState) -> Result<(), EngineError> {
    if !state.auto_commit && conn.is_autocommit() {
        conn.execute_batch("BEGIN").map_err(map_sqlite_error)?;
    }
    Ok(())
}

fn rowid_row(conn: &Connection) -> GeneratedRows {
    GeneratedRows {
        columns: vec![ColumnDescriptor {
            name: "rowid".into(),
            tag: TypeTag::BigInt,
            nullable: Some(false),
            precision: None,
            scale: None,
        }],
        rows: vec![vec![EngineValue::BigInt(conn.last_insert_rowid())]],
    }
}

/// Forward-only cursor over rows materialised on the worker thread.
pub struct SqliteCursor {
    columns: Vec<ColumnDescriptor>,
    rows: std::vec::IntoIter<Vec<EngineValue>>,
}

impl EngineCursor for SqliteCursor {
    fn descriptor(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<EngineValue>>, EngineError> {
        Ok(self.rows.next())
    }

    fn close(&mut self) {}
}

struct SqliteLobSource {
    bytes: Vec<u8>,
    offset: usize,
}

impl LobSource for SqliteLobSource {
    fn read_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, EngineError> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }
        let end = self.bytes.len().min(self.offset + max_len.max(1));
        let chunk = self.bytes[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(chunk))
    }

    fn close(&mut self) {}
}

fn map_sqlite_error(err: rusqlite::Error) -> EngineError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let kind = match failure.code {
                ErrorCode::ConstraintViolation => EngineErrorKind::DataIntegrity,
                ErrorCode::DatabaseBusy => EngineErrorKind::TransientResource,
                ErrorCode::DatabaseLocked => EngineErrorKind::Timeout,
                ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied => {
                    EngineErrorKind::PermissionDenied
                }
                ErrorCode::DiskFull
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure => EngineErrorKind::NonTransientResource,
                _ => EngineErrorKind::General,
            };
            EngineError::new(
                kind,
                failure.extended_code,
                SQL_STATE,
                message
                    .clone()
                    .unwrap_or_else(|| failure.to_string()),
            )
        }
        rusqlite::Error::SqlInputError { error, msg, .. } => EngineError::new(
            EngineErrorKind::BadGrammar,
            error.extended_code,
            SQL_STATE,
            msg.clone(),
        ),
        other => EngineError::general(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some(message.into()))
    }

    #[test]
    fn constraint_failures_classify_as_data_integrity() {
        let err = map_sqlite_error(failure(
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: t.id",
        ));
        assert_eq!(err.kind, EngineErrorKind::DataIntegrity);
        assert_eq!(err.code, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
        assert_eq!(err.sql_state, SQL_STATE);
    }

    #[test]
    fn busy_and_locked_classify_as_transient_and_timeout() {
        let busy = map_sqlite_error(failure(rusqlite::ffi::SQLITE_BUSY, "database is locked"));
        assert_eq!(busy.kind, EngineErrorKind::TransientResource);
        let locked = map_sqlite_error(failure(
            rusqlite::ffi::SQLITE_LOCKED,
            "database table is locked",
        ));
        assert_eq!(locked.kind, EngineErrorKind::Timeout);
    }

    #[test]
    fn readonly_classifies_as_permission_denied() {
        let err = map_sqlite_error(failure(
            rusqlite::ffi::SQLITE_READONLY,
            "attempt to write a readonly database",
        ));
        assert_eq!(err.kind, EngineErrorKind::PermissionDenied);
    }

    #[test]
    fn disk_failures_classify_as_non_transient() {
        let err = map_sqlite_error(failure(rusqlite::ffi::SQLITE_FULL, "database or disk is full"));
        assert_eq!(err.kind, EngineErrorKind::NonTransientResource);
    }

    #[test]
    fn prepare_failures_classify_as_bad_grammar() {
        let err = map_sqlite_error(rusqlite::Error::SqlInputError {
            error: rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            msg: "near \"SELEC\": syntax error".into(),
            sql: "SELEC 1".into(),
            offset: 0,
        });
        assert_eq!(err.kind, EngineErrorKind::BadGrammar);
        assert!(err.message.contains("syntax error"));
    }

    #[test]
    fn lob_store_hands_back_what_it_swallowed() {
        let mut state = SqliteState {
            next_lob_id: 1,
            auto_commit: true,
            ..SqliteState::default()
        };
        let mut content: &[u8] = b"foobarbaz";
        let lob = state
            .store_lob(LobKind::Binary, &mut content, Some(9))
            .unwrap();
        assert_eq!(lob.length, Some(9));
        assert_eq!(state.lob_bytes(&lob).unwrap(), b"foobarbaz");

        let mut source = SqliteLobSource {
            bytes: state.lob_bytes(&lob).unwrap(),
            offset: 0,
        };
        assert_eq!(source.read_chunk(4).unwrap().as_deref(), Some(&b"foob"[..]));
        assert_eq!(source.read_chunk(100).unwrap().as_deref(), Some(&b"arbaz"[..]));
        assert_eq!(source.read_chunk(4).unwrap(), None);
    }

    #[test]
    fn character_lobs_must_be_utf8() {
        let mut state = SqliteState::default();
        let mut content: &[u8] = &[0xff, 0xfe];
        let err = state
            .store_lob(LobKind::Character, &mut content, None)
            .unwrap_err();
        assert!(err.message.contains("UTF-8"), "{err}");
    }
}
