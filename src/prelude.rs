//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so callers can
//! bring the whole surface in with a single `use`.

pub use crate::connection::BridgeConnection;
pub use crate::error::{EngineError, EngineErrorKind, SqlBridgeError};
pub use crate::lob::{Blob, BlobStream, Clob, ClobStream, LobContent};
pub use crate::result::{GeneratedKeys, ResultStream, RowStream, SqlResult, UpdateResult};
pub use crate::row::{ColumnMetadata, Row, RowMetadata};
pub use crate::statement::Statement;
pub use crate::value::{
    HostDecode, HostType, HostValue, IntervalQualifier, MonthSpan, SqlInterval, TypeTag,
};

#[cfg(feature = "geometry")]
pub use crate::value::Point;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteSession;

#[cfg(feature = "test-utils")]
pub use crate::test_support::{RecordedCommand, StubHandle, StubSession};
