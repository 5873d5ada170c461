use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::SqlBridgeError;
use crate::value::{BlobValue, EngineValue, HostType, HostValue, TypeTag};

use super::{Codec, Codecs, NUMERIC_TAGS, mismatch, wrong_host};

/// Widens any integer-ish engine value to `i64`, rounding floating point the
/// way engines round on assignment.
fn decode_integer(value: &EngineValue) -> Result<i64, SqlBridgeError> {
    match value {
        EngineValue::TinyInt(v) => Ok(i64::from(*v)),
        EngineValue::SmallInt(v) => Ok(i64::from(*v)),
        EngineValue::Integer(v) => Ok(i64::from(*v)),
        EngineValue::BigInt(v) => Ok(*v),
        EngineValue::Decimal(v) => v.to_i64().ok_or_else(|| {
            SqlBridgeError::ConversionError(format!("decimal {v} out of range for i64"))
        }),
        EngineValue::Real(v) => rounded_to_i64(f64::from(*v)),
        EngineValue::Double(v) => rounded_to_i64(*v),
        other => Err(mismatch("numeric", other)),
    }
}

fn rounded_to_i64(value: f64) -> Result<i64, SqlBridgeError> {
    let rounded = value.round();
    if rounded.is_finite() && (i64::MIN as f64) <= rounded && rounded <= (i64::MAX as f64) {
        Ok(rounded as i64)
    } else {
        Err(SqlBridgeError::ConversionError(format!(
            "value {value} out of range for i64"
        )))
    }
}

fn decode_float(value: &EngineValue) -> Result<f64, SqlBridgeError> {
    match value {
        EngineValue::TinyInt(v) => Ok(f64::from(*v)),
        EngineValue::SmallInt(v) => Ok(f64::from(*v)),
        EngineValue::Integer(v) => Ok(f64::from(*v)),
        EngineValue::BigInt(v) => Ok(*v as f64),
        EngineValue::Decimal(v) => v.to_f64().ok_or_else(|| {
            SqlBridgeError::ConversionError(format!("decimal {v} does not fit in f64"))
        }),
        EngineValue::Real(v) => Ok(f64::from(*v)),
        EngineValue::Double(v) => Ok(*v),
        other => Err(mismatch("numeric", other)),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, target: HostType) -> Result<T, SqlBridgeError> {
    T::try_from(value).map_err(|_| {
        SqlBridgeError::ConversionError(format!("value {value} out of range for {}", target.name()))
    })
}

pub(super) struct BooleanCodec;

impl Codec for BooleanCodec {
    fn host_type(&self) -> HostType {
        HostType::Bool
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Boolean)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Boolean(v) => Ok(HostValue::Bool(*v)),
            other => Err(mismatch("boolean", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Bool(v) => Ok(EngineValue::Boolean(v)),
            other => Err(wrong_host(HostType::Bool, &other)),
        }
    }
}

macro_rules! integer_codec {
    ($(#[$meta:meta])* $name:ident, $host:ident, $tag:ident, $ty:ty) => {
        $(#[$meta])*
        pub(super) struct $name;

        impl Codec for $name {
            fn host_type(&self) -> HostType {
                HostType::$host
            }

            fn claims(&self, tag: &TypeTag) -> bool {
                matches!(tag, TypeTag::$tag)
            }

            fn claims_family(&self, tag: &TypeTag) -> bool {
                NUMERIC_TAGS.contains(tag)
            }

            fn decode(
                &self,
                value: &EngineValue,
                _codecs: &Codecs,
            ) -> Result<HostValue, SqlBridgeError> {
                let wide = decode_integer(value)?;
                narrow::<$ty>(wide, HostType::$host).map(HostValue::$host)
            }

            fn encode(
                &self,
                value: HostValue,
                _codecs: &Codecs,
            ) -> Result<EngineValue, SqlBridgeError> {
                match value {
                    HostValue::$host(v) => Ok(EngineValue::$tag(v)),
                    other => Err(wrong_host(HostType::$host, &other)),
                }
            }
        }
    };
}

integer_codec!(ByteCodec, I8, TinyInt, i8);
integer_codec!(ShortCodec, I16, SmallInt, i16);
integer_codec!(IntegerCodec, I32, Integer, i32);
integer_codec!(LongCodec, I64, BigInt, i64);

pub(super) struct FloatCodec;

impl Codec for FloatCodec {
    fn host_type(&self) -> HostType {
        HostType::F32
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Real)
    }

    fn claims_family(&self, tag: &TypeTag) -> bool {
        NUMERIC_TAGS.contains(tag)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        decode_float(value).map(|v| HostValue::F32(v as f32))
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::F32(v) => Ok(EngineValue::Real(v)),
            other => Err(wrong_host(HostType::F32, &other)),
        }
    }
}

pub(super) struct DoubleCodec;

impl Codec for DoubleCodec {
    fn host_type(&self) -> HostType {
        HostType::F64
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Double)
    }

    fn claims_family(&self, tag: &TypeTag) -> bool {
        NUMERIC_TAGS.contains(tag)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        decode_float(value).map(HostValue::F64)
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::F64(v) => Ok(EngineValue::Double(v)),
            other => Err(wrong_host(HostType::F64, &other)),
        }
    }
}

pub(super) struct DecimalCodec;

impl Codec for DecimalCodec {
    fn host_type(&self) -> HostType {
        HostType::Decimal
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Decimal)
    }

    fn claims_family(&self, tag: &TypeTag) -> bool {
        NUMERIC_TAGS.contains(tag)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        let decimal = match value {
            EngineValue::TinyInt(v) => Decimal::from(*v),
            EngineValue::SmallInt(v) => Decimal::from(*v),
            EngineValue::Integer(v) => Decimal::from(*v),
            EngineValue::BigInt(v) => Decimal::from(*v),
            EngineValue::Decimal(v) => *v,
            EngineValue::Real(v) => Decimal::from_f32(*v).ok_or_else(|| {
                SqlBridgeError::ConversionError(format!("value {v} has no exact decimal form"))
            })?,
            EngineValue::Double(v) => Decimal::from_f64(*v).ok_or_else(|| {
                SqlBridgeError::ConversionError(format!("value {v} has no exact decimal form"))
            })?,
            other => return Err(mismatch("numeric", other)),
        };
        Ok(HostValue::Decimal(decimal))
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Decimal(v) => Ok(EngineValue::Decimal(v)),
            other => Err(wrong_host(HostType::Decimal, &other)),
        }
    }
}

pub(super) struct StringCodec;

impl Codec for StringCodec {
    fn host_type(&self) -> HostType {
        HostType::Text
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Varchar)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Text(v) => Ok(HostValue::Text(v.clone())),
            other => Err(mismatch("character", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Text(v) => Ok(EngineValue::Text(v)),
            other => Err(wrong_host(HostType::Text, &other)),
        }
    }
}

/// Raw binary columns as owned byte vectors. Also reads inline binary large
/// objects, so small blob values work without streaming.
pub(super) struct BytesCodec;

impl Codec for BytesCodec {
    fn host_type(&self) -> HostType {
        HostType::Bytes
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Binary)
    }

    fn claims_family(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Binary | TypeTag::Blob)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Bytes(v) => Ok(HostValue::Bytes(v.clone())),
            EngineValue::Blob(BlobValue::Bytes(v)) => Ok(HostValue::Bytes(v.to_vec())),
            EngineValue::Blob(_) => Err(SqlBridgeError::ConversionError(
                "engine-side binary large object; request Blob and stream it".into(),
            )),
            other => Err(mismatch("binary", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Bytes(v) => Ok(EngineValue::Bytes(v)),
            other => Err(wrong_host(HostType::Bytes, &other)),
        }
    }
}

pub(super) struct UuidCodec;

impl Codec for UuidCodec {
    fn host_type(&self) -> HostType {
        HostType::Uuid
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Uuid)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Uuid(v) => Ok(HostValue::Uuid(*v)),
            other => Err(mismatch("uuid", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Uuid(v) => Ok(EngineValue::Uuid(v)),
            other => Err(wrong_host(HostType::Uuid, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_decode_widens_and_narrows() {
        assert_eq!(decode_integer(&EngineValue::TinyInt(-3)).unwrap(), -3);
        assert_eq!(decode_integer(&EngineValue::BigInt(1 << 40)).unwrap(), 1 << 40);
        assert_eq!(narrow::<i8>(127, HostType::I8).unwrap(), 127);
        assert!(narrow::<i8>(128, HostType::I8).is_err());
    }

    #[test]
    fn fractional_decimal_rejected_for_integers_when_out_of_range() {
        let wide = Decimal::from(i64::MAX);
        let too_wide = wide + Decimal::from(1);
        assert!(decode_integer(&EngineValue::Decimal(too_wide)).is_err());
    }

    #[test]
    fn floats_round_on_integer_decode() {
        assert_eq!(decode_integer(&EngineValue::Double(41.6)).unwrap(), 42);
        assert!(decode_integer(&EngineValue::Double(f64::NAN)).is_err());
    }

    #[test]
    fn mismatched_variant_is_a_conversion_error() {
        let codec = BooleanCodec;
        let codecs = Codecs::empty();
        let err = codec
            .decode(&EngineValue::Text("yes".into()), &codecs)
            .unwrap_err();
        assert!(matches!(err, SqlBridgeError::ConversionError(_)));
    }
}
