//! Scripted engine for protocol tests, enabled by the `test-utils` feature.
//!
//! [`StubSession`] plays back per-statement rules and records everything the
//! bridge sends it, so executor, binding and large-object behaviour can be
//! asserted without a real engine.

mod stub;

pub use stub::{RecordedCommand, StubHandle, StubSession};

use async_trait::async_trait;

use crate::engine::{LobKind, LobRef, LobSource};
use crate::error::SqlBridgeError;
use crate::lob::LobStore;
use crate::lob::sink::ChunkReader;

/// Store for codec-level tests that never reach an engine; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLobStore;

#[async_trait]
impl LobStore for NullLobStore {
    async fn create_lob(
        &self,
        _kind: LobKind,
        _data: ChunkReader,
        _known_len: Option<u64>,
    ) -> Result<LobRef, SqlBridgeError> {
        Err(SqlBridgeError::ResourceError(
            "no engine session to stream against".into(),
        ))
    }

    async fn open_lob_source(&self, lob: LobRef) -> Result<Box<dyn LobSource>, SqlBridgeError> {
        Err(SqlBridgeError::ResourceError(format!(
            "no engine session to open large object {}",
            lob.id
        )))
    }
}
