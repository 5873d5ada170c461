use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::bytes::Bytes;
use uuid::Uuid;

use crate::engine::LobRef;
use crate::lob::LobContent;
use crate::value::interval::{IntervalQualifier, SqlInterval};
#[cfg(feature = "geometry")]
use crate::value::point::Point;

/// Engine-side type tag, as reported by result descriptors and used by codec
/// dispatch. One variant per engine type family; intervals carry their
/// qualifier so codecs can claim qualifier subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Real,
    Double,
    Varchar,
    Binary,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Blob,
    Clob,
    Interval(IntervalQualifier),
    Array,
    #[cfg(feature = "geometry")]
    Geometry,
}

impl TypeTag {
    /// Human-readable name for error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Decimal => "DECIMAL",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
            Self::Binary => "VARBINARY",
            Self::Uuid => "UUID",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            Self::Blob => "BLOB",
            Self::Clob => "CLOB",
            Self::Interval(_) => "INTERVAL",
            Self::Array => "ARRAY",
            #[cfg(feature = "geometry")]
            Self::Geometry => "GEOMETRY",
        }
    }
}

/// Binary large-object payload inside an [`EngineValue`].
///
/// Sessions emit `Bytes` when the content is already in memory and `Ref` when
/// it should be streamed on demand. `Pending` only ever appears on the encode
/// path, before the executor has created the engine-side object.
#[derive(Debug, Clone)]
pub enum BlobValue {
    Bytes(Bytes),
    Ref(LobRef),
    Pending(LobContent),
}

impl PartialEq for BlobValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            // Pending content is a one-shot stream; it has no value identity.
            _ => false,
        }
    }
}

/// Character large-object payload inside an [`EngineValue`].
#[derive(Debug, Clone)]
pub enum ClobValue {
    Text(String),
    Ref(LobRef),
    Pending(LobContent),
}

impl PartialEq for ClobValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }
}

/// The value currency of the engine boundary: everything bound to a command
/// or read from a cursor is one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Decimal(Decimal),
    Real(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Interval(SqlInterval),
    Blob(BlobValue),
    Clob(ClobValue),
    Array(Vec<EngineValue>),
    #[cfg(feature = "geometry")]
    Geometry(Point),
}

impl EngineValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The tag this value would carry in a descriptor.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Boolean(_) => TypeTag::Boolean,
            Self::TinyInt(_) => TypeTag::TinyInt,
            Self::SmallInt(_) => TypeTag::SmallInt,
            Self::Integer(_) => TypeTag::Integer,
            Self::BigInt(_) => TypeTag::BigInt,
            Self::Decimal(_) => TypeTag::Decimal,
            Self::Real(_) => TypeTag::Real,
            Self::Double(_) => TypeTag::Double,
            Self::Text(_) => TypeTag::Varchar,
            Self::Bytes(_) => TypeTag::Binary,
            Self::Uuid(_) => TypeTag::Uuid,
            Self::Date(_) => TypeTag::Date,
            Self::Time(_) => TypeTag::Time,
            Self::Timestamp(_) => TypeTag::Timestamp,
            Self::TimestampTz(_) => TypeTag::TimestampTz,
            Self::Interval(interval) => TypeTag::Interval(interval.qualifier),
            Self::Blob(_) => TypeTag::Blob,
            Self::Clob(_) => TypeTag::Clob,
            Self::Array(_) => TypeTag::Array,
            #[cfg(feature = "geometry")]
            Self::Geometry(_) => TypeTag::Geometry,
        }
    }
}
