use std::sync::Arc;
use std::thread;

use async_stream::{stream, try_stream};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_util::bytes::Bytes;

use crate::engine::{LobRef, LobSource};
use crate::error::SqlBridgeError;

use super::{CHUNK_SIZE, LobStore};

/// Chunk stream over an engine-side large object.
///
/// The source is opened lazily on first poll, then drained by a dedicated
/// reader thread through a capacity-one channel. The source is closed exactly
/// once: on exhaustion, on read failure, or when the consumer goes away and
/// the thread's next send fails.
pub(crate) fn engine_bytes_stream(
    store: Arc<dyn LobStore>,
    lob: LobRef,
) -> BoxStream<'static, Result<Bytes, SqlBridgeError>> {
    Box::pin(try_stream! {
        let lob_id = lob.id;
        let source = store
            .open_lob_source(lob)
            .await
            .map_err(|err| lob_failure("open", lob_id, err))?;
        let mut receiver = spawn_reader(source, lob_id)?;
        while let Some(item) = receiver.recv().await {
            yield item?;
        }
    })
}

fn spawn_reader(
    mut source: Box<dyn LobSource>,
    lob_id: u64,
) -> Result<mpsc::Receiver<Result<Bytes, SqlBridgeError>>, SqlBridgeError> {
    let (tx, rx) = mpsc::channel(1);
    thread::Builder::new()
        .name(format!("lob-reader-{lob_id}"))
        .spawn(move || {
            loop {
                match source.read_chunk(CHUNK_SIZE) {
                    Ok(Some(chunk)) => {
                        if tx.blocking_send(Ok(Bytes::from(chunk))).is_err() {
                            // Consumer dropped the stream; stop reading.
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.blocking_send(Err(SqlBridgeError::ResourceError(format!(
                            "large object {lob_id} read failed: {err}"
                        ))));
                        break;
                    }
                }
            }
            source.close();
            tracing::trace!(lob_id, "large object source closed");
        })
        .map_err(|err| {
            SqlBridgeError::ResourceError(format!(
                "failed to spawn large object reader thread: {err}"
            ))
        })?;
    Ok(rx)
}

fn lob_failure(action: &str, lob_id: u64, err: SqlBridgeError) -> SqlBridgeError {
    match err {
        SqlBridgeError::ConnectionError(_) => err,
        other => {
            SqlBridgeError::ResourceError(format!("cannot {action} large object {lob_id}: {other}"))
        }
    }
}

/// Chunk stream over content that is already in memory. Chunked at
/// [`CHUNK_SIZE`] so consumers see the same shape as engine-backed streams.
pub(crate) fn memory_bytes_stream(
    data: Bytes,
) -> BoxStream<'static, Result<Bytes, SqlBridgeError>> {
    Box::pin(stream! {
        let mut rest = data;
        while !rest.is_empty() {
            let take = rest.len().min(CHUNK_SIZE);
            yield Ok::<Bytes, SqlBridgeError>(rest.split_to(take));
        }
    })
}

/// Adapts a byte-chunk stream into a text-chunk stream, holding back the
/// trailing bytes of a UTF-8 sequence split across a chunk boundary.
pub(crate) fn character_stream(
    bytes: BoxStream<'static, Result<Bytes, SqlBridgeError>>,
) -> BoxStream<'static, Result<String, SqlBridgeError>> {
    Box::pin(try_stream! {
        let mut bytes = bytes;
        let mut assembler = Utf8ChunkAssembler::default();
        while let Some(chunk) = bytes.next().await {
            if let Some(text) = assembler.push(&chunk?)? {
                yield text;
            }
        }
        assembler.finish()?;
    })
}

/// Reassembles UTF-8 text from byte chunks with arbitrary boundaries. At most
/// three bytes (one partial sequence) are carried between chunks.
#[derive(Debug, Default)]
pub(crate) struct Utf8ChunkAssembler {
    carry: Vec<u8>,
}

impl Utf8ChunkAssembler {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Option<String>, SqlBridgeError> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);
        let valid_len = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(err) => {
                if err.error_len().is_some() {
                    return Err(invalid_utf8());
                }
                err.valid_up_to()
            }
        };
        self.carry = buf.split_off(valid_len);
        if buf.is_empty() {
            return Ok(None);
        }
        String::from_utf8(buf).map(Some).map_err(|_| invalid_utf8())
    }

    pub(crate) fn finish(&mut self) -> Result<(), SqlBridgeError> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            Err(SqlBridgeError::ResourceError(
                "character large object ends inside a multi-byte character".into(),
            ))
        }
    }
}

fn invalid_utf8() -> SqlBridgeError {
    SqlBridgeError::ResourceError("character large object contains invalid UTF-8".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_passes_ascii_through() {
        let mut assembler = Utf8ChunkAssembler::default();
        assert_eq!(assembler.push(b"hello").unwrap().as_deref(), Some("hello"));
        assembler.finish().unwrap();
    }

    #[test]
    fn assembler_carries_split_sequences() {
        // "é" is 0xC3 0xA9; split it across two chunks.
        let mut assembler = Utf8ChunkAssembler::default();
        assert_eq!(assembler.push(&[b'a', 0xC3]).unwrap().as_deref(), Some("a"));
        assert_eq!(assembler.push(&[0xA9, b'b']).unwrap().as_deref(), Some("éb"));
        assembler.finish().unwrap();
    }

    #[test]
    fn assembler_rejects_invalid_bytes() {
        let mut assembler = Utf8ChunkAssembler::default();
        assert!(assembler.push(&[0xFF]).is_err());
    }

    #[test]
    fn assembler_rejects_dangling_tail() {
        let mut assembler = Utf8ChunkAssembler::default();
        assert_eq!(assembler.push(&[0xC3]).unwrap(), None);
        assert!(assembler.finish().is_err());
    }

    #[tokio::test]
    async fn memory_stream_chunks_at_boundary() {
        let data = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]);
        let mut stream = memory_bytes_stream(data);
        let mut sizes = Vec::new();
        while let Some(chunk) = stream.next().await {
            sizes.push(chunk.unwrap().len());
        }
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
    }

    #[tokio::test]
    async fn character_stream_rejoins_multibyte() {
        let text = "a".repeat(CHUNK_SIZE - 1) + "é🙂";
        let bytes = Bytes::from(text.clone().into_bytes());
        let mut stream = character_stream(memory_bytes_stream(bytes));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        assert_eq!(out, text);
    }
}
