use std::fmt;
use std::sync::Arc;

use crate::error::SqlBridgeError;
use crate::lob::LobStore;
use crate::value::{EngineValue, HostType, HostValue, TypeTag};

use super::array::ArrayCodec;
#[cfg(feature = "geometry")]
use super::geometry::GeometryCodec;
use super::lob::{BlobCodec, BlobToBufferCodec, ClobCodec, ClobToStringCodec};
use super::primitive::{
    BooleanCodec, ByteCodec, BytesCodec, DecimalCodec, DoubleCodec, FloatCodec, IntegerCodec,
    LongCodec, ShortCodec, StringCodec, UuidCodec,
};
use super::temporal::{
    DateCodec, DurationCodec, InstantCodec, IntervalCodec, MonthSpanCodec, OffsetTimestampCodec,
    TimeCodec, TimestampCodec, ZonedTimestampCodec,
};
use super::{Codec, Requested};

/// The connection's ordered codec list. Built once per connection and shared
/// read-only after that; position in the list is dispatch priority.
pub(crate) struct Codecs {
    codecs: Vec<Box<dyn Codec>>,
}

impl Codecs {
    /// The standard codec set. The order is part of the observable contract:
    /// buffer-variant LOB codecs come before the streaming handles, scalars
    /// before the array codec, and the array codec is last because it
    /// re-enters the registry per element.
    pub(crate) fn standard(store: Arc<dyn LobStore>) -> Self {
        let codecs: Vec<Box<dyn Codec>> = vec![
            Box::new(DecimalCodec),
            Box::new(BlobToBufferCodec),
            Box::new(BlobCodec::new(Arc::clone(&store))),
            Box::new(ClobToStringCodec),
            Box::new(ClobCodec::new(store)),
            Box::new(BooleanCodec),
            Box::new(ByteCodec),
            Box::new(BytesCodec),
            Box::new(DoubleCodec),
            Box::new(FloatCodec),
            Box::new(IntegerCodec),
            Box::new(DateCodec),
            Box::new(TimestampCodec),
            Box::new(TimeCodec),
            Box::new(LongCodec),
            Box::new(OffsetTimestampCodec),
            Box::new(ShortCodec),
            Box::new(StringCodec),
            Box::new(UuidCodec),
            Box::new(ZonedTimestampCodec),
            Box::new(InstantCodec),
            Box::new(IntervalCodec),
            Box::new(MonthSpanCodec),
            Box::new(DurationCodec),
            #[cfg(feature = "geometry")]
            Box::new(GeometryCodec),
            Box::new(ArrayCodec),
        ];
        Self { codecs }
    }

    #[cfg(test)]
    pub(super) fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Decodes one column value into the requested host type. `None` when
    /// the value is the engine null or the column has the SQL-null tag; the
    /// caller decides how null maps into its target type.
    ///
    /// # Errors
    ///
    /// `NoCodecFound` when no registered codec accepts the tag/requested
    /// pair; `ConversionError` when the winning codec cannot represent the
    /// value.
    pub(crate) fn decode(
        &self,
        value: &EngineValue,
        tag: &TypeTag,
        requested: Requested,
    ) -> Result<Option<HostValue>, SqlBridgeError> {
        if value.is_null() || matches!(tag, TypeTag::Null) {
            return Ok(None);
        }
        for codec in &self.codecs {
            if codec.can_decode(tag, requested) {
                return codec.decode(value, self).map(Some);
            }
        }
        Err(SqlBridgeError::NoCodecFound(match requested {
            Requested::Any => format!("decoding a {} column", tag.name()),
            Requested::Exact(want) => {
                format!("decoding a {} column as {}", tag.name(), want.name())
            }
        }))
    }

    /// Encodes one non-null host value for binding.
    ///
    /// # Errors
    ///
    /// `NoCodecFound` when no codec encodes the value's runtime type.
    pub(crate) fn encode(&self, value: HostValue) -> Result<EngineValue, SqlBridgeError> {
        let kind = value.kind();
        for codec in &self.codecs {
            if codec.can_encode(&value) {
                return codec.encode(value, self);
            }
        }
        Err(SqlBridgeError::NoCodecFound(format!(
            "encoding a {} value",
            kind.name()
        )))
    }

    /// Encodes a typed null for binding.
    ///
    /// # Errors
    ///
    /// `NoCodecFound` when no codec covers the host type.
    pub(crate) fn encode_null(&self, host_type: HostType) -> Result<EngineValue, SqlBridgeError> {
        for codec in &self.codecs {
            if codec.can_encode_null(host_type) {
                return Ok(codec.encode_null());
            }
        }
        Err(SqlBridgeError::NoCodecFound(format!(
            "encoding a null of type {}",
            host_type.name()
        )))
    }

    /// The host type an untyped decode of `tag` resolves to; `None` for tags
    /// no codec claims.
    pub(crate) fn preferred_type(&self, tag: &TypeTag) -> Option<HostType> {
        if matches!(tag, TypeTag::Null) {
            return Some(HostType::Unit);
        }
        self.codecs
            .iter()
            .find(|codec| codec.can_decode(tag, Requested::Any))
            .map(|codec| codec.host_type())
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs")
            .field("len", &self.codecs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeDelta, TimeZone, Utc};
    use rust_decimal::Decimal;
    use tokio_util::bytes::Bytes;

    use crate::engine::{LobKind, LobRef, LobSource};
    use crate::lob::sink::ChunkReader;
    use crate::value::{BlobValue, ClobValue, IntervalQualifier, MonthSpan};

    use super::*;

    struct NoStore;

    #[async_trait]
    impl LobStore for NoStore {
        async fn create_lob(
            &self,
            _kind: LobKind,
            _data: ChunkReader,
            _known_len: Option<u64>,
        ) -> Result<LobRef, SqlBridgeError> {
            Err(SqlBridgeError::ResourceError("no session here".into()))
        }

        async fn open_lob_source(
            &self,
            _lob: LobRef,
        ) -> Result<Box<dyn LobSource>, SqlBridgeError> {
            Err(SqlBridgeError::ResourceError("no session here".into()))
        }
    }

    fn codecs() -> Codecs {
        Codecs::standard(Arc::new(NoStore))
    }

    #[test]
    fn null_decodes_to_none_for_any_request() {
        let codecs = codecs();
        let decoded = codecs
            .decode(
                &EngineValue::Null,
                &TypeTag::Integer,
                Requested::Exact(HostType::I32),
            )
            .unwrap();
        assert_eq!(decoded, None);
        let decoded = codecs
            .decode(&EngineValue::Null, &TypeTag::Null, Requested::Any)
            .unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn untyped_blob_decode_prefers_the_buffer_codec() {
        let codecs = codecs();
        let value = EngineValue::Blob(BlobValue::Bytes(Bytes::from_static(b"abc")));
        let decoded = codecs
            .decode(&value, &TypeTag::Blob, Requested::Any)
            .unwrap();
        assert_eq!(
            decoded,
            Some(HostValue::ByteBuffer(Bytes::from_static(b"abc")))
        );
    }

    #[test]
    fn explicit_blob_request_yields_a_handle() {
        let codecs = codecs();
        let value = EngineValue::Blob(BlobValue::Bytes(Bytes::from_static(b"abc")));
        let decoded = codecs
            .decode(&value, &TypeTag::Blob, Requested::Exact(HostType::Blob))
            .unwrap();
        assert!(matches!(decoded, Some(HostValue::Blob(_))));
    }

    #[test]
    fn untyped_clob_decode_prefers_string() {
        let codecs = codecs();
        let value = EngineValue::Clob(ClobValue::Text("hello".into()));
        let decoded = codecs
            .decode(&value, &TypeTag::Clob, Requested::Any)
            .unwrap();
        assert_eq!(decoded, Some(HostValue::Text("hello".into())));
    }

    #[test]
    fn cross_width_integer_requests_convert_with_range_checks() {
        let codecs = codecs();
        let widened = codecs
            .decode(
                &EngineValue::Integer(7),
                &TypeTag::Integer,
                Requested::Exact(HostType::I64),
            )
            .unwrap();
        assert_eq!(widened, Some(HostValue::I64(7)));

        let narrowed = codecs
            .decode(
                &EngineValue::BigInt(300),
                &TypeTag::BigInt,
                Requested::Exact(HostType::I8),
            )
            .unwrap_err();
        assert!(matches!(narrowed, SqlBridgeError::ConversionError(_)));
    }

    #[test]
    fn integer_column_as_decimal_goes_through_the_decimal_codec() {
        let codecs = codecs();
        let decoded = codecs
            .decode(
                &EngineValue::Integer(42),
                &TypeTag::Integer,
                Requested::Exact(HostType::Decimal),
            )
            .unwrap();
        assert_eq!(decoded, Some(HostValue::Decimal(Decimal::from(42))));
    }

    #[test]
    fn unsupported_pairing_reports_no_codec() {
        let codecs = codecs();
        let err = codecs
            .decode(
                &EngineValue::Integer(1),
                &TypeTag::Integer,
                Requested::Exact(HostType::Date),
            )
            .unwrap_err();
        match err {
            SqlBridgeError::NoCodecFound(detail) => assert!(detail.contains("NaiveDate")),
            other => panic!("expected NoCodecFound, got {other:?}"),
        }
    }

    #[test]
    fn preferred_types_follow_registration_order() {
        let codecs = codecs();
        assert_eq!(codecs.preferred_type(&TypeTag::Null), Some(HostType::Unit));
        assert_eq!(
            codecs.preferred_type(&TypeTag::Integer),
            Some(HostType::I32)
        );
        assert_eq!(
            codecs.preferred_type(&TypeTag::Decimal),
            Some(HostType::Decimal)
        );
        assert_eq!(
            codecs.preferred_type(&TypeTag::Blob),
            Some(HostType::ByteBuffer)
        );
        assert_eq!(codecs.preferred_type(&TypeTag::Clob), Some(HostType::Text));
        assert_eq!(
            codecs.preferred_type(&TypeTag::TimestampTz),
            Some(HostType::OffsetTimestamp)
        );
        assert_eq!(
            codecs.preferred_type(&TypeTag::Interval(IntervalQualifier::Day)),
            Some(HostType::Interval)
        );
        assert_eq!(codecs.preferred_type(&TypeTag::Array), Some(HostType::List));
    }

    #[test]
    fn strings_encode_through_the_plain_string_codec() {
        let codecs = codecs();
        let encoded = codecs.encode(HostValue::Text("foo".into())).unwrap();
        assert_eq!(encoded, EngineValue::Text("foo".into()));
    }

    #[test]
    fn buffers_encode_as_plain_binary() {
        let codecs = codecs();
        let encoded = codecs
            .encode(HostValue::ByteBuffer(Bytes::from_static(b"xy")))
            .unwrap();
        assert_eq!(encoded, EngineValue::Bytes(vec![b'x', b'y']));
    }

    #[test]
    fn durations_encode_with_the_second_qualifier() {
        let codecs = codecs();
        let encoded = codecs
            .encode(HostValue::Duration(TimeDelta::seconds(90)))
            .unwrap();
        match encoded {
            EngineValue::Interval(interval) => {
                assert_eq!(interval.qualifier, IntervalQualifier::Second);
                assert_eq!(interval.to_duration().unwrap(), TimeDelta::seconds(90));
            }
            other => panic!("expected interval, got {other:?}"),
        }
    }

    #[test]
    fn month_spans_encode_as_year_to_month() {
        let codecs = codecs();
        let encoded = codecs
            .encode(HostValue::MonthSpan(MonthSpan::new(1, 3)))
            .unwrap();
        match encoded {
            EngineValue::Interval(interval) => {
                assert_eq!(interval.qualifier, IntervalQualifier::YearToMonth);
                assert_eq!(interval.to_month_span().unwrap(), MonthSpan::new(1, 3));
            }
            other => panic!("expected interval, got {other:?}"),
        }
    }

    #[test]
    fn zoned_decode_anchors_to_utc_preserving_the_instant() {
        let codecs = codecs();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let stamp = offset.with_ymd_and_hms(2024, 5, 17, 10, 30, 0).unwrap();
        let decoded = codecs
            .decode(
                &EngineValue::TimestampTz(stamp),
                &TypeTag::TimestampTz,
                Requested::Exact(HostType::ZonedTimestamp),
            )
            .unwrap();
        match decoded {
            Some(HostValue::ZonedTimestamp(zoned)) => {
                assert_eq!(zoned.with_timezone(&Utc), stamp.with_timezone(&Utc));
            }
            other => panic!("expected zoned timestamp, got {other:?}"),
        }
    }

    #[test]
    fn arrays_recurse_through_the_registry_both_ways() {
        let codecs = codecs();
        let value = EngineValue::Array(vec![
            EngineValue::Integer(1),
            EngineValue::Null,
            EngineValue::Text("x".into()),
        ]);
        let decoded = codecs
            .decode(&value, &TypeTag::Array, Requested::Any)
            .unwrap();
        assert_eq!(
            decoded,
            Some(HostValue::List(vec![
                HostValue::I32(1),
                HostValue::Null,
                HostValue::Text("x".into()),
            ]))
        );

        let encoded = codecs
            .encode(HostValue::List(vec![
                HostValue::I64(5),
                HostValue::Null,
            ]))
            .unwrap();
        assert_eq!(
            encoded,
            EngineValue::Array(vec![EngineValue::BigInt(5), EngineValue::Null])
        );
    }

    #[test]
    fn typed_nulls_encode_when_a_codec_exists() {
        let codecs = codecs();
        assert_eq!(
            codecs.encode_null(HostType::Text).unwrap(),
            EngineValue::Null
        );
        assert!(matches!(
            codecs.encode_null(HostType::Unit),
            Err(SqlBridgeError::NoCodecFound(_))
        ));
    }
}
