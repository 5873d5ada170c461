use std::io;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::bytes::Bytes;

use crate::binding::Binding;
use crate::engine::LobKind;
use crate::error::SqlBridgeError;
use crate::value::engine::{BlobValue, ClobValue, EngineValue};

use super::{LobContent, LobStore};

/// Chunks in flight between the async drain task and the blocking reader.
const PIPE_DEPTH: usize = 1;

/// Blocking `Read` view over a bounded chunk pipe.
///
/// Lives on the worker thread, where the engine's create call drains it; a
/// stream failure upstream surfaces as an I/O error mid-read.
pub(crate) struct ChunkReader {
    receiver: mpsc::Receiver<Result<Bytes, SqlBridgeError>>,
    current: Bytes,
}

impl ChunkReader {
    fn new(receiver: mpsc::Receiver<Result<Bytes, SqlBridgeError>>) -> Self {
        Self {
            receiver,
            current: Bytes::new(),
        }
    }
}

impl io::Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.receiver.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(err)) => return Err(io::Error::other(err.to_string())),
                None => return Ok(0),
            }
        }
        let take = buf.len().min(self.current.len());
        let chunk = self.current.split_to(take);
        buf[..take].copy_from_slice(&chunk);
        Ok(take)
    }
}

/// Takes the content's stream and starts the drain task feeding one end of
/// the pipe; the returned reader is the other end.
///
/// If the reader stops early the drain task sees the closed channel and
/// stops; if the stream fails, the failure is forwarded and the pipe closed.
fn pipe(content: &LobContent) -> Result<(ChunkReader, Option<u64>), SqlBridgeError> {
    let mut stream = content.take()?;
    let known_len = content.known_len();
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });
    Ok((ChunkReader::new(rx), known_len))
}

/// Replaces every pending large object in the binding with an engine-side
/// reference, creating the objects through `store`. Runs once per binding,
/// before the first execution that uses it.
pub(crate) async fn materialise_binding(
    store: &dyn LobStore,
    binding: &mut Binding,
) -> Result<(), SqlBridgeError> {
    for (_, value) in binding.iter_mut() {
        materialise_value(store, value).await?;
    }
    Ok(())
}

fn materialise_value<'a>(
    store: &'a dyn LobStore,
    value: &'a mut EngineValue,
) -> BoxFuture<'a, Result<(), SqlBridgeError>> {
    Box::pin(async move {
        match value {
            EngineValue::Blob(BlobValue::Pending(content)) => {
                let (reader, known_len) = pipe(content)?;
                let lob = store.create_lob(LobKind::Binary, reader, known_len).await?;
                *value = EngineValue::Blob(BlobValue::Ref(lob));
            }
            EngineValue::Clob(ClobValue::Pending(content)) => {
                let (reader, known_len) = pipe(content)?;
                let lob = store.create_lob(LobKind::Character, reader, known_len).await?;
                *value = EngineValue::Clob(ClobValue::Ref(lob));
            }
            EngineValue::Array(items) => {
                for item in items {
                    materialise_value(store, item).await?;
                }
            }
            _ => {}
        }
        Ok(())
    })
}
