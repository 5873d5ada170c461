//! Large-object bridging between the blocking engine world and async
//! consumers.
//!
//! Decode direction: an engine-side reference opens a blocking pull source on
//! a dedicated reader thread and chunks flow through a capacity-one channel,
//! so the consumer's demand paces the reads. Encode direction: caller chunks
//! drain into a bounded pipe whose receiving end looks like `std::io::Read`
//! to the engine's create call on the worker thread.

pub(crate) mod sink;
pub(crate) mod stream;

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio_util::bytes::Bytes;

use crate::engine::{LobKind, LobRef, LobSource};
use crate::error::SqlBridgeError;
use crate::value::engine::{BlobValue, ClobValue};

use sink::ChunkReader;
use stream::{character_stream, engine_bytes_stream, memory_bytes_stream};

/// Chunk size for large-object reads. A tuning constant, not part of any
/// contract; consumers must tolerate arbitrary chunk boundaries.
pub(crate) const CHUNK_SIZE: usize = 1024;

/// Async seam to the worker that owns the engine session, for the two
/// large-object operations that need it: creating engine-side objects and
/// opening read sources over them.
#[async_trait]
pub(crate) trait LobStore: Send + Sync {
    async fn create_lob(
        &self,
        kind: LobKind,
        data: ChunkReader,
        known_len: Option<u64>,
    ) -> Result<LobRef, SqlBridgeError>;

    async fn open_lob_source(&self, lob: LobRef) -> Result<Box<dyn LobSource>, SqlBridgeError>;
}

/// Caller-supplied large-object content: a one-shot async byte-chunk stream.
///
/// Clones share the same underlying stream; the first `take` wins and later
/// ones fail, even across bindings cloned for batched execution.
#[derive(Clone)]
pub struct LobContent {
    stream: Arc<Mutex<Option<BoxStream<'static, Result<Bytes, SqlBridgeError>>>>>,
    known_len: Option<u64>,
}

impl LobContent {
    pub(crate) fn from_bytes(data: Bytes) -> Self {
        let known_len = u64::try_from(data.len()).ok();
        Self {
            stream: Arc::new(Mutex::new(Some(memory_bytes_stream(data)))),
            known_len,
        }
    }

    pub(crate) fn from_stream(
        stream: BoxStream<'static, Result<Bytes, SqlBridgeError>>,
    ) -> Self {
        Self {
            stream: Arc::new(Mutex::new(Some(stream))),
            known_len: None,
        }
    }

    pub(crate) fn known_len(&self) -> Option<u64> {
        self.known_len
    }

    pub(crate) fn take(&self) -> Result<BoxStream<'static, Result<Bytes, SqlBridgeError>>, SqlBridgeError> {
        self.stream
            .lock()
            .map_err(|_| SqlBridgeError::ResourceError("large object content lock poisoned".into()))?
            .take()
            .ok_or_else(|| {
                SqlBridgeError::ResourceError("large object content already consumed".into())
            })
    }
}

impl fmt::Debug for LobContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobContent")
            .field("known_len", &self.known_len)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) enum LobHandle {
    /// Backed by an engine-side object, streamed through the worker.
    Engine {
        store: Arc<dyn LobStore>,
        lob: LobRef,
    },
    /// Content that travelled inline with its row.
    Memory { data: Bytes },
    /// Caller content not yet sent to the engine.
    Local { content: LobContent },
}

impl LobHandle {
    fn bytes_stream(self) -> BoxStream<'static, Result<Bytes, SqlBridgeError>> {
        match self {
            Self::Engine { store, lob } => engine_bytes_stream(store, lob),
            Self::Memory { data } => memory_bytes_stream(data),
            Self::Local { content } => match content.take() {
                Ok(stream) => stream,
                Err(err) => futures_util::stream::once(async move { Err(err) }).boxed(),
            },
        }
    }

    fn debug_name(&self) -> String {
        match self {
            Self::Engine { lob, .. } => format!("engine#{}", lob.id),
            Self::Memory { data } => format!("memory[{}B]", data.len()),
            Self::Local { .. } => "local".into(),
        }
    }
}

/// Binary large-object handle.
///
/// Streams its content exactly once: [`stream`](Self::stream) consumes the
/// handle, and the source is released on completion, failure, and drop alike.
#[derive(Clone)]
pub struct Blob {
    inner: LobHandle,
}

impl Blob {
    /// Handle over in-memory bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            inner: LobHandle::Local {
                content: LobContent::from_bytes(data.into()),
            },
        }
    }

    /// Handle over an async chunk stream. Chunk boundaries are free; the
    /// engine sees the concatenation.
    #[must_use]
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<Bytes, SqlBridgeError>> + Send + 'static,
    {
        Self {
            inner: LobHandle::Local {
                content: LobContent::from_stream(stream.boxed()),
            },
        }
    }

    pub(crate) fn engine(store: Arc<dyn LobStore>, lob: LobRef) -> Self {
        Self {
            inner: LobHandle::Engine { store, lob },
        }
    }

    pub(crate) fn memory(data: Bytes) -> Self {
        Self {
            inner: LobHandle::Memory { data },
        }
    }

    pub(crate) fn into_value(self) -> BlobValue {
        match self.inner {
            LobHandle::Engine { lob, .. } => BlobValue::Ref(lob),
            LobHandle::Memory { data } => BlobValue::Bytes(data),
            LobHandle::Local { content } => BlobValue::Pending(content),
        }
    }

    /// The single subscription to this object's content.
    #[must_use]
    pub fn stream(self) -> BlobStream {
        BlobStream {
            inner: self.inner.bytes_stream(),
        }
    }

    /// Drains the whole object into memory.
    ///
    /// # Errors
    ///
    /// Returns `SqlBridgeError::ResourceError` when streaming fails.
    pub async fn read_all(self) -> Result<Vec<u8>, SqlBridgeError> {
        let mut stream = self.stream();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Releases the handle without streaming its content.
    pub fn discard(self) {}
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", self.inner.debug_name())
    }
}

impl PartialEq for Blob {
    /// Handles have no value identity; they never compare equal.
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

/// Character large-object handle. Same lifecycle as [`Blob`], but streams
/// decoded UTF-8 text.
#[derive(Clone)]
pub struct Clob {
    inner: LobHandle,
}

impl Clob {
    /// Handle over an in-memory string.
    #[must_use]
    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            inner: LobHandle::Local {
                content: LobContent::from_bytes(Bytes::from(text.into().into_bytes())),
            },
        }
    }

    /// Handle over an async stream of string chunks.
    #[must_use]
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<String, SqlBridgeError>> + Send + 'static,
    {
        let bytes = stream.map(|item| item.map(|text| Bytes::from(text.into_bytes())));
        Self {
            inner: LobHandle::Local {
                content: LobContent::from_stream(bytes.boxed()),
            },
        }
    }

    pub(crate) fn engine(store: Arc<dyn LobStore>, lob: LobRef) -> Self {
        Self {
            inner: LobHandle::Engine { store, lob },
        }
    }

    pub(crate) fn memory(text: String) -> Self {
        Self {
            inner: LobHandle::Memory {
                data: Bytes::from(text.into_bytes()),
            },
        }
    }

    pub(crate) fn into_value(self) -> ClobValue {
        match self.inner {
            LobHandle::Engine { lob, .. } => ClobValue::Ref(lob),
            LobHandle::Memory { data } => match String::from_utf8(data.to_vec()) {
                Ok(text) => ClobValue::Text(text),
                // Memory handles are built from String; this arm is unreachable
                // without a corrupted source, treat it as fresh pending content.
                Err(err) => ClobValue::Pending(LobContent::from_bytes(err.into_bytes().into())),
            },
            LobHandle::Local { content } => ClobValue::Pending(content),
        }
    }

    /// The single subscription to this object's content.
    #[must_use]
    pub fn stream(self) -> ClobStream {
        ClobStream {
            inner: character_stream(self.inner.bytes_stream()),
        }
    }

    /// Drains the whole object into one string.
    ///
    /// # Errors
    ///
    /// Returns `SqlBridgeError::ResourceError` when streaming fails or the
    /// content is not valid UTF-8.
    pub async fn read_all(self) -> Result<String, SqlBridgeError> {
        let mut stream = self.stream();
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }

    /// Releases the handle without streaming its content.
    pub fn discard(self) {}
}

impl fmt::Debug for Clob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clob({})", self.inner.debug_name())
    }
}

impl PartialEq for Clob {
    /// Handles have no value identity; they never compare equal.
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

/// Demand-driven byte-chunk stream over one large object.
pub struct BlobStream {
    inner: BoxStream<'static, Result<Bytes, SqlBridgeError>>,
}

impl futures_util::Stream for BlobStream {
    type Item = Result<Bytes, SqlBridgeError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

/// Demand-driven text-chunk stream over one character large object.
pub struct ClobStream {
    inner: BoxStream<'static, Result<String, SqlBridgeError>>,
}

impl futures_util::Stream for ClobStream {
    type Item = Result<String, SqlBridgeError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
