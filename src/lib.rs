mod binding;
mod codec;
mod connection;
mod error;
mod result;
mod row;
mod statement;
mod worker;

pub mod engine;
pub mod lob;
pub mod prelude;
pub mod value;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_support;

pub use connection::BridgeConnection;
pub use error::{EngineError, EngineErrorKind, SqlBridgeError};
pub use lob::{Blob, BlobStream, Clob, ClobStream, LobContent};
pub use result::{GeneratedKeys, ResultStream, RowStream, SqlResult, UpdateResult};
pub use row::{ColumnMetadata, Row, RowMetadata};
pub use statement::Statement;
pub use value::{HostDecode, HostType, HostValue};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSession;
