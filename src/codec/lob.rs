use std::sync::Arc;

use crate::error::SqlBridgeError;
use crate::lob::{Blob, Clob, LobStore};
use crate::value::{BlobValue, ClobValue, EngineValue, HostType, HostValue, TypeTag};

use super::{Codec, Codecs, mismatch, wrong_host};

fn must_stream(what: &str) -> SqlBridgeError {
    SqlBridgeError::ConversionError(format!(
        "engine-side {what} large object; request the streaming handle type"
    ))
}

/// Binary large objects eagerly materialised into a buffer. Registered ahead
/// of the handle codec, so inline blob values decode to buffers by default;
/// engine-side references refuse and push the caller to the handle.
pub(super) struct BlobToBufferCodec;

impl Codec for BlobToBufferCodec {
    fn host_type(&self) -> HostType {
        HostType::ByteBuffer
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Blob)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Blob(BlobValue::Bytes(data)) => Ok(HostValue::ByteBuffer(data.clone())),
            EngineValue::Blob(_) => Err(must_stream("binary")),
            other => Err(mismatch("binary large object", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::ByteBuffer(data) => Ok(EngineValue::Bytes(data.to_vec())),
            other => Err(wrong_host(HostType::ByteBuffer, &other)),
        }
    }
}

/// Streaming [`Blob`] handles. Holds the connection's store so decoded
/// engine references can open read sources later.
pub(super) struct BlobCodec {
    store: Arc<dyn LobStore>,
}

impl BlobCodec {
    pub(super) fn new(store: Arc<dyn LobStore>) -> Self {
        Self { store }
    }
}

impl Codec for BlobCodec {
    fn host_type(&self) -> HostType {
        HostType::Blob
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Blob)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Blob(BlobValue::Bytes(data)) => {
                Ok(HostValue::Blob(Blob::memory(data.clone())))
            }
            EngineValue::Blob(BlobValue::Ref(lob)) => Ok(HostValue::Blob(Blob::engine(
                Arc::clone(&self.store),
                lob.clone(),
            ))),
            EngineValue::Blob(BlobValue::Pending(_)) => Err(SqlBridgeError::ConversionError(
                "unsent large object content cannot be decoded".into(),
            )),
            other => Err(mismatch("binary large object", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Blob(blob) => Ok(EngineValue::Blob(blob.into_value())),
            other => Err(wrong_host(HostType::Blob, &other)),
        }
    }
}

/// Character large objects as strings, decode only; strings always encode
/// through the plain string codec.
pub(super) struct ClobToStringCodec;

impl Codec for ClobToStringCodec {
    fn host_type(&self) -> HostType {
        HostType::Text
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Clob)
    }

    fn encodes(&self) -> bool {
        false
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Clob(ClobValue::Text(text)) => Ok(HostValue::Text(text.clone())),
            EngineValue::Clob(_) => Err(must_stream("character")),
            other => Err(mismatch("character large object", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        Err(wrong_host(HostType::Text, &value))
    }
}

/// Streaming [`Clob`] handles.
pub(super) struct ClobCodec {
    store: Arc<dyn LobStore>,
}

impl ClobCodec {
    pub(super) fn new(store: Arc<dyn LobStore>) -> Self {
        Self { store }
    }
}

impl Codec for ClobCodec {
    fn host_type(&self) -> HostType {
        HostType::Clob
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Clob)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Clob(ClobValue::Text(text)) => {
                Ok(HostValue::Clob(Clob::memory(text.clone())))
            }
            EngineValue::Clob(ClobValue::Ref(lob)) => Ok(HostValue::Clob(Clob::engine(
                Arc::clone(&self.store),
                lob.clone(),
            ))),
            EngineValue::Clob(ClobValue::Pending(_)) => Err(SqlBridgeError::ConversionError(
                "unsent large object content cannot be decoded".into(),
            )),
            other => Err(mismatch("character large object", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Clob(clob) => Ok(EngineValue::Clob(clob.into_value())),
            other => Err(wrong_host(HostType::Clob, &other)),
        }
    }
}
