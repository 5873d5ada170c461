use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use crate::binding::Binding;
use crate::engine::{
    EngineCommand, EngineCursor, EngineSession, GeneratedColumns, LobKind, LobRef, LobSource,
};
use crate::error::SqlBridgeError;
use crate::lob::sink::ChunkReader;
use crate::value::EngineValue;

use super::channel::{ExecuteOutcome, Request};

pub(super) fn run_worker<S: EngineSession>(mut session: S, receiver: &Receiver<Request>) {
    let mut cursors: HashMap<u64, S::Cursor> = HashMap::new();
    // Cursor IDs never leave this connection; u64 won't exhaust in practice.
    let mut next_cursor_id: u64 = 1;

    while let Ok(request) = receiver.recv() {
        match request {
            Request::Shutdown => break,
            Request::Execute {
                sql,
                binding,
                generated,
                respond_to,
            } => {
                let outcome = execute(
                    &mut session,
                    &mut cursors,
                    &mut next_cursor_id,
                    &sql,
                    binding,
                    &generated,
                );
                let _ = respond_to.send(outcome);
            }
            Request::FetchRow {
                cursor_id,
                respond_to,
            } => {
                let _ = respond_to.send(fetch_row::<S>(&mut cursors, cursor_id));
            }
            Request::CloseCursor { cursor_id } => {
                if let Some(mut cursor) = cursors.remove(&cursor_id) {
                    cursor.close();
                }
            }
            Request::CreateLob {
                kind,
                mut data,
                known_len,
                respond_to,
            } => {
                let _ = respond_to.send(create_lob(&mut session, kind, &mut data, known_len));
            }
            Request::OpenLobSource { lob, respond_to } => {
                let _ = respond_to.send(open_lob_source(&mut session, &lob));
            }
            Request::SetAutoCommit {
                auto_commit,
                respond_to,
            } => {
                let result = session
                    .set_auto_commit(auto_commit)
                    .map_err(SqlBridgeError::from);
                let _ = respond_to.send(result);
            }
            Request::InTransaction { respond_to } => {
                let _ = respond_to.send(session.in_transaction().map_err(SqlBridgeError::from));
            }
            Request::Close { respond_to } => {
                let _ = respond_to.send(release(&mut session, &mut cursors));
                return;
            }
        }
    }

    // Channel closed or Shutdown: release whatever is still open. Nobody is
    // listening for the outcome at this point.
    let _ = release(&mut session, &mut cursors);
}

fn execute<S: EngineSession>(
    session: &mut S,
    cursors: &mut HashMap<u64, S::Cursor>,
    next_cursor_id: &mut u64,
    sql: &str,
    binding: Binding,
    generated: &GeneratedColumns,
) -> Result<ExecuteOutcome, SqlBridgeError> {
    let mut command = session.prepare(sql)?;
    for (position, value) in binding {
        command.bind(position, value)?;
    }
    if command.is_query() {
        let cursor = command.execute_query(None, false)?;
        let columns = cursor.descriptor().to_vec();
        let cursor_id = *next_cursor_id;
        *next_cursor_id = next_cursor_id.saturating_add(1);
        cursors.insert(cursor_id, cursor);
        Ok(ExecuteOutcome::Query { cursor_id, columns })
    } else {
        let outcome = command.execute_update(generated)?;
        Ok(ExecuteOutcome::Update(outcome))
    }
}

/// Pulls one row. The native cursor is closed and forgotten as soon as it is
/// exhausted or fails, so an unknown ID just reads as exhausted.
fn fetch_row<S: EngineSession>(
    cursors: &mut HashMap<u64, S::Cursor>,
    cursor_id: u64,
) -> Result<Option<Vec<EngineValue>>, SqlBridgeError> {
    let Some(cursor) = cursors.get_mut(&cursor_id) else {
        return Ok(None);
    };
    match cursor.next_row() {
        Ok(Some(row)) => Ok(Some(row)),
        Ok(None) => {
            close_cursor::<S>(cursors, cursor_id);
            Ok(None)
        }
        Err(err) => {
            close_cursor::<S>(cursors, cursor_id);
            Err(err.into())
        }
    }
}

fn close_cursor<S: EngineSession>(cursors: &mut HashMap<u64, S::Cursor>, cursor_id: u64) {
    if let Some(mut cursor) = cursors.remove(&cursor_id) {
        cursor.close();
    }
}

fn create_lob<S: EngineSession>(
    session: &mut S,
    kind: LobKind,
    data: &mut ChunkReader,
    known_len: Option<u64>,
) -> Result<LobRef, SqlBridgeError> {
    let lob = match kind {
        LobKind::Binary => session.create_blob(data, known_len),
        LobKind::Character => session.create_clob(data, known_len),
    }
    .map_err(|err| SqlBridgeError::ResourceError(format!("cannot create large object: {err}")))?;
    session.add_temporary_lob(&lob);
    Ok(lob)
}

fn open_lob_source<S: EngineSession>(
    session: &mut S,
    lob: &LobRef,
) -> Result<Box<dyn LobSource>, SqlBridgeError> {
    session
        .open_lob_source(lob)
        .map_err(|err| SqlBridgeError::ResourceError(format!("cannot open large object: {err}")))
}

fn release<S: EngineSession>(
    session: &mut S,
    cursors: &mut HashMap<u64, S::Cursor>,
) -> Result<(), SqlBridgeError> {
    for (_, mut cursor) in cursors.drain() {
        cursor.close();
    }
    session.close().map_err(SqlBridgeError::from)
}
