//! SQLite rendition of the engine traits over `rusqlite`.
//!
//! One [`SqliteSession`] wraps one connection and is meant to be handed to
//! [`BridgeConnection::connect`](crate::BridgeConnection::connect), which
//! moves it onto a worker thread. Column tags come from declared types when
//! the schema names them, otherwise from the first non-null value.

mod session;
mod types;

pub use session::SqliteSession;
