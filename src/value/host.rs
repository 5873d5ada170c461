use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::bytes::Bytes;
use uuid::Uuid;

use crate::error::SqlBridgeError;
use crate::lob::{Blob, Clob};
use crate::value::interval::{MonthSpan, SqlInterval};
#[cfg(feature = "geometry")]
use crate::value::point::Point;

/// Application-facing type, the "requested type" of codec dispatch.
///
/// `Unit` is the preferred type of the SQL NULL tag; no codec encodes or
/// decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Text,
    Bytes,
    ByteBuffer,
    Uuid,
    Date,
    Time,
    Timestamp,
    OffsetTimestamp,
    ZonedTimestamp,
    Instant,
    Interval,
    MonthSpan,
    Duration,
    Blob,
    Clob,
    List,
    #[cfg(feature = "geometry")]
    Geometry,
    Unit,
}

impl HostType {
    /// Human-readable name for error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "Decimal",
            Self::Text => "String",
            Self::Bytes => "Vec<u8>",
            Self::ByteBuffer => "Bytes",
            Self::Uuid => "Uuid",
            Self::Date => "NaiveDate",
            Self::Time => "NaiveTime",
            Self::Timestamp => "NaiveDateTime",
            Self::OffsetTimestamp => "DateTime<FixedOffset>",
            Self::ZonedTimestamp => "DateTime<Tz>",
            Self::Instant => "DateTime<Utc>",
            Self::Interval => "SqlInterval",
            Self::MonthSpan => "MonthSpan",
            Self::Duration => "TimeDelta",
            Self::Blob => "Blob",
            Self::Clob => "Clob",
            Self::List => "Vec<HostValue>",
            #[cfg(feature = "geometry")]
            Self::Geometry => "Point",
            Self::Unit => "()",
        }
    }
}

/// A decoded (or to-be-encoded) application value.
///
/// Large-object handles compare as never-equal; everything else compares by
/// value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    ByteBuffer(Bytes),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    OffsetTimestamp(DateTime<FixedOffset>),
    ZonedTimestamp(DateTime<Tz>),
    Instant(DateTime<Utc>),
    Interval(SqlInterval),
    MonthSpan(MonthSpan),
    Duration(TimeDelta),
    Blob(Blob),
    Clob(Clob),
    List(Vec<HostValue>),
    #[cfg(feature = "geometry")]
    Geometry(Point),
    Null,
}

impl HostValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The runtime host type; `Unit` for the null value.
    #[must_use]
    pub fn kind(&self) -> HostType {
        match self {
            Self::Bool(_) => HostType::Bool,
            Self::I8(_) => HostType::I8,
            Self::I16(_) => HostType::I16,
            Self::I32(_) => HostType::I32,
            Self::I64(_) => HostType::I64,
            Self::F32(_) => HostType::F32,
            Self::F64(_) => HostType::F64,
            Self::Decimal(_) => HostType::Decimal,
            Self::Text(_) => HostType::Text,
            Self::Bytes(_) => HostType::Bytes,
            Self::ByteBuffer(_) => HostType::ByteBuffer,
            Self::Uuid(_) => HostType::Uuid,
            Self::Date(_) => HostType::Date,
            Self::Time(_) => HostType::Time,
            Self::Timestamp(_) => HostType::Timestamp,
            Self::OffsetTimestamp(_) => HostType::OffsetTimestamp,
            Self::ZonedTimestamp(_) => HostType::ZonedTimestamp,
            Self::Instant(_) => HostType::Instant,
            Self::Interval(_) => HostType::Interval,
            Self::MonthSpan(_) => HostType::MonthSpan,
            Self::Duration(_) => HostType::Duration,
            Self::Blob(_) => HostType::Blob,
            Self::Clob(_) => HostType::Clob,
            Self::List(_) => HostType::List,
            #[cfg(feature = "geometry")]
            Self::Geometry(_) => HostType::Geometry,
            Self::Null => HostType::Unit,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(value) = self { Some(*value) } else { None }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I8(value) => Some(i64::from(*value)),
            Self::I16(value) => Some(i64::from(*value)),
            Self::I32(value) => Some(i64::from(*value)),
            Self::I64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(value) => Some(f64::from(*value)),
            Self::F64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Self::Text(value) = self { Some(value) } else { None }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            Self::ByteBuffer(value) => Some(value),
            _ => None,
        }
    }
}

macro_rules! host_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(impl From<$source> for HostValue {
            fn from(value: $source) -> Self {
                HostValue::$variant(value)
            }
        })*
    };
}

host_value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => Text,
    Vec<u8> => Bytes,
    Bytes => ByteBuffer,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<FixedOffset> => OffsetTimestamp,
    DateTime<Tz> => ZonedTimestamp,
    DateTime<Utc> => Instant,
    SqlInterval => Interval,
    MonthSpan => MonthSpan,
    TimeDelta => Duration,
    Blob => Blob,
    Clob => Clob,
    Vec<HostValue> => List,
}

#[cfg(feature = "geometry")]
host_value_from! { Point => Geometry }

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_owned())
    }
}

impl From<&[u8]> for HostValue {
    fn from(value: &[u8]) -> Self {
        HostValue::Bytes(value.to_vec())
    }
}

/// Rust types that can be requested from a row column.
///
/// `HOST_TYPE` drives codec dispatch; `from_host` unwraps the decoded value.
pub trait HostDecode: Sized {
    const HOST_TYPE: HostType;

    /// Unwraps a decoded value. Never called with [`HostValue::Null`].
    ///
    /// # Errors
    ///
    /// Returns `SqlBridgeError::ConversionError` when the decoded value is
    /// not the expected variant.
    fn from_host(value: HostValue) -> Result<Self, SqlBridgeError>;

    /// The result for a SQL NULL column.
    ///
    /// # Errors
    ///
    /// Errors unless the type has a null representation; wrap the type in
    /// `Option` to accept NULL.
    fn from_null() -> Result<Self, SqlBridgeError> {
        Err(SqlBridgeError::ConversionError(format!(
            "column is NULL; request Option<{}> instead",
            Self::HOST_TYPE.name()
        )))
    }
}

macro_rules! host_decode {
    ($($target:ty => $variant:ident / $host_type:ident),* $(,)?) => {
        $(impl HostDecode for $target {
            const HOST_TYPE: HostType = HostType::$host_type;

            fn from_host(value: HostValue) -> Result<Self, SqlBridgeError> {
                match value {
                    HostValue::$variant(inner) => Ok(inner),
                    other => Err(SqlBridgeError::ConversionError(format!(
                        "expected {}, decoded {}",
                        HostType::$host_type.name(),
                        other.kind().name()
                    ))),
                }
            }
        })*
    };
}

host_decode! {
    bool => Bool / Bool,
    i8 => I8 / I8,
    i16 => I16 / I16,
    i32 => I32 / I32,
    i64 => I64 / I64,
    f32 => F32 / F32,
    f64 => F64 / F64,
    Decimal => Decimal / Decimal,
    String => Text / Text,
    Vec<u8> => Bytes / Bytes,
    Bytes => ByteBuffer / ByteBuffer,
    Uuid => Uuid / Uuid,
    NaiveDate => Date / Date,
    NaiveTime => Time / Time,
    NaiveDateTime => Timestamp / Timestamp,
    DateTime<FixedOffset> => OffsetTimestamp / OffsetTimestamp,
    DateTime<Tz> => ZonedTimestamp / ZonedTimestamp,
    DateTime<Utc> => Instant / Instant,
    SqlInterval => Interval / Interval,
    MonthSpan => MonthSpan / MonthSpan,
    TimeDelta => Duration / Duration,
    Blob => Blob / Blob,
    Clob => Clob / Clob,
    Vec<HostValue> => List / List,
}

#[cfg(feature = "geometry")]
host_decode! { Point => Geometry / Geometry }

impl<T: HostDecode> HostDecode for Option<T> {
    const HOST_TYPE: HostType = T::HOST_TYPE;

    fn from_host(value: HostValue) -> Result<Self, SqlBridgeError> {
        T::from_host(value).map(Some)
    }

    fn from_null() -> Result<Self, SqlBridgeError> {
        Ok(None)
    }
}
