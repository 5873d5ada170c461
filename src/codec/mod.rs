//! Value conversion between engine values and application types.
//!
//! Each codec owns one host type. The registry walks codecs in a fixed
//! registration order and the first one whose predicates accept wins, so
//! order is dispatch priority. Everything here is synchronous; the large
//! object codecs defer the async work to handles instead of doing it inline.

mod array;
#[cfg(feature = "geometry")]
mod geometry;
mod lob;
mod primitive;
mod registry;
mod temporal;

pub(crate) use registry::Codecs;

use crate::error::SqlBridgeError;
use crate::value::{EngineValue, HostType, HostValue, TypeTag};

/// What the caller asked a column to decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requested {
    /// No preference; the column's canonical host type is used.
    Any,
    Exact(HostType),
}

/// One conversion strategy. Codecs are stateless apart from the LOB pair,
/// which carry the connection's store handle.
pub(crate) trait Codec: Send + Sync {
    /// Host type this codec produces on decode and consumes on encode.
    fn host_type(&self) -> HostType;

    /// Engine tags this codec is the canonical decoder for. Decides both
    /// untyped dispatch and the preferred host type of a column.
    fn claims(&self, tag: &TypeTag) -> bool;

    /// Wider tag set honored when the caller asked for this codec's host
    /// type explicitly. Must contain everything `claims` accepts.
    fn claims_family(&self, tag: &TypeTag) -> bool {
        self.claims(tag)
    }

    /// False for decode-only codecs.
    fn encodes(&self) -> bool {
        true
    }

    fn can_decode(&self, tag: &TypeTag, requested: Requested) -> bool {
        match requested {
            Requested::Any => self.claims(tag),
            Requested::Exact(want) => want == self.host_type() && self.claims_family(tag),
        }
    }

    fn can_encode(&self, value: &HostValue) -> bool {
        self.encodes() && value.kind() == self.host_type()
    }

    fn can_encode_null(&self, host_type: HostType) -> bool {
        self.encodes() && host_type == self.host_type()
    }

    /// Converts a non-null engine value. `codecs` is there for the array
    /// codec's element recursion; everyone else ignores it.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when the value cannot be represented in the
    /// codec's host type.
    fn decode(&self, value: &EngineValue, codecs: &Codecs) -> Result<HostValue, SqlBridgeError>;

    /// Converts a non-null host value.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when the value cannot be represented as an
    /// engine value.
    fn encode(&self, value: HostValue, codecs: &Codecs) -> Result<EngineValue, SqlBridgeError>;

    /// The engine rendition of a typed null. The tag information is carried
    /// by dispatch, not the value, so every codec produces the same null.
    fn encode_null(&self) -> EngineValue {
        EngineValue::Null
    }
}

/// The tags every numeric codec converts between with range checking.
pub(super) const NUMERIC_TAGS: [TypeTag; 7] = [
    TypeTag::TinyInt,
    TypeTag::SmallInt,
    TypeTag::Integer,
    TypeTag::BigInt,
    TypeTag::Decimal,
    TypeTag::Real,
    TypeTag::Double,
];

pub(super) fn mismatch(expected: &str, value: &EngineValue) -> SqlBridgeError {
    SqlBridgeError::ConversionError(format!(
        "expected a {expected} engine value, found {}",
        value.tag().name()
    ))
}

pub(super) fn wrong_host(expected: HostType, value: &HostValue) -> SqlBridgeError {
    SqlBridgeError::ConversionError(format!(
        "expected a {} host value, found {}",
        expected.name(),
        value.kind().name()
    ))
}
