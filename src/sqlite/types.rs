use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Value;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio_util::bytes::Bytes;
use uuid::Uuid;

use crate::error::{EngineError, EngineErrorKind};
use crate::value::{BlobValue, ClobValue, EngineValue, IntervalQualifier, SqlInterval, TypeTag};

/// SQLite reports no SQLSTATE; the whole binding uses the generic one.
pub(super) const SQL_STATE: &str = "HY000";

pub(super) const DATE_FORMAT: &str = "%F";
pub(super) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(super) const TIMESTAMP_FORMAT: &str = "%F %T%.f";
pub(super) const TIMESTAMP_TZ_FORMAT: &str = "%F %T%.f%:z";

/// Column type parsed from a declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct DeclaredType {
    pub tag: TypeTag,
    pub precision: Option<u64>,
    pub scale: Option<u32>,
}

/// Maps a declared column type to a tag, `None` when the declaration is not
/// recognised. Exact names first, then SQLite's affinity-style substring
/// rules.
pub(super) fn parse_decl(decl: &str) -> Option<DeclaredType> {
    let trimmed = decl.trim();
    let (base, args) = match trimmed.split_once('(') {
        Some((base, rest)) => (base, Some(rest.trim_end().trim_end_matches(')'))),
        None => (trimmed, None),
    };
    let base = base
        .trim()
        .to_ascii_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut precision = None;
    let mut scale = None;
    if let Some(args) = args {
        let mut parts = args.split(',');
        precision = parts.next().and_then(|part| part.trim().parse().ok());
        scale = parts.next().and_then(|part| part.trim().parse().ok());
    }

    let tag = match base.as_str() {
        "BOOL" | "BOOLEAN" => TypeTag::Boolean,
        "TINYINT" => TypeTag::TinyInt,
        "SMALLINT" | "INT2" => TypeTag::SmallInt,
        "INT" | "INTEGER" | "MEDIUMINT" => TypeTag::Integer,
        "BIGINT" | "INT8" | "UNSIGNED BIG INT" => TypeTag::BigInt,
        "DECIMAL" | "NUMERIC" | "NUMBER" => TypeTag::Decimal,
        "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => TypeTag::Double,
        "DATE" => TypeTag::Date,
        "TIME" => TypeTag::Time,
        "DATETIME" | "TIMESTAMP" => TypeTag::Timestamp,
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => TypeTag::TimestampTz,
        "UUID" => TypeTag::Uuid,
        "BLOB" => TypeTag::Blob,
        "CLOB" => TypeTag::Clob,
        "BINARY" | "VARBINARY" | "RAW" | "BYTEA" => TypeTag::Binary,
        other => {
            // "INTERVAL" alone would match the INT substring below.
            if let Some(qualifier) = other.strip_prefix("INTERVAL") {
                let qualifier = IntervalQualifier::from_sql(qualifier)
                    .unwrap_or(IntervalQualifier::Second);
                TypeTag::Interval(qualifier)
            } else if other.contains("CHAR") || other.contains("TEXT") {
                TypeTag::Varchar
            } else if other.contains("INT") {
                TypeTag::BigInt
            } else if other.contains("REAL") || other.contains("FLOA") || other.contains("DOUB") {
                TypeTag::Double
            } else {
                return None;
            }
        }
    };
    Some(DeclaredType {
        tag,
        precision,
        scale,
    })
}

/// Tag for an undeclared column, taken from the first non-null value in the
/// materialised rows. Empty or all-null columns read as VARCHAR.
pub(super) fn infer_tag(rows: &[Vec<Value>], index: usize) -> TypeTag {
    rows.iter()
        .find_map(|row| match row.get(index) {
            Some(Value::Integer(_)) => Some(TypeTag::BigInt),
            Some(Value::Real(_)) => Some(TypeTag::Double),
            Some(Value::Text(_)) => Some(TypeTag::Varchar),
            Some(Value::Blob(_)) => Some(TypeTag::Binary),
            _ => None,
        })
        .unwrap_or(TypeTag::Varchar)
}

/// Converts an engine value into the SQLite storage form: temporals,
/// decimals, uuids and intervals as text, booleans as 0/1 integers.
pub(super) fn to_sqlite_value(value: EngineValue) -> Result<Value, EngineError> {
    let value = match value {
        EngineValue::Null => Value::Null,
        EngineValue::Boolean(flag) => Value::Integer(i64::from(flag)),
        EngineValue::TinyInt(v) => Value::Integer(i64::from(v)),
        EngineValue::SmallInt(v) => Value::Integer(i64::from(v)),
        EngineValue::Integer(v) => Value::Integer(i64::from(v)),
        EngineValue::BigInt(v) => Value::Integer(v),
        EngineValue::Decimal(v) => Value::Text(v.to_string()),
        EngineValue::Real(v) => Value::Real(f64::from(v)),
        EngineValue::Double(v) => Value::Real(v),
        EngineValue::Text(v) => Value::Text(v),
        EngineValue::Bytes(v) => Value::Blob(v),
        EngineValue::Uuid(v) => Value::Text(v.to_string()),
        EngineValue::Date(v) => Value::Text(v.format(DATE_FORMAT).to_string()),
        EngineValue::Time(v) => Value::Text(v.format(TIME_FORMAT).to_string()),
        EngineValue::Timestamp(v) => Value::Text(v.format(TIMESTAMP_FORMAT).to_string()),
        EngineValue::TimestampTz(v) => Value::Text(v.format(TIMESTAMP_TZ_FORMAT).to_string()),
        EngineValue::Interval(v) => Value::Text(v.to_string()),
        EngineValue::Blob(BlobValue::Bytes(bytes)) => Value::Blob(bytes.to_vec()),
        EngineValue::Clob(ClobValue::Text(text)) => Value::Text(text),
        EngineValue::Blob(_) | EngineValue::Clob(_) => {
            return Err(EngineError::general(
                "large object content must be uploaded before binding",
            ));
        }
        EngineValue::Array(_) => return Err(unsupported("ARRAY")),
        #[cfg(feature = "geometry")]
        EngineValue::Geometry(_) => return Err(unsupported("GEOMETRY")),
    };
    Ok(value)
}

/// Converts a stored SQLite value back into an engine value, steered by the
/// column tag. A value whose storage shape does not fit the tag decays to
/// its raw shape and the codec layer reports the mismatch.
pub(super) fn from_sqlite_value(raw: Value, tag: TypeTag) -> Result<EngineValue, EngineError> {
    let value = match (tag, raw) {
        (_, Value::Null) => EngineValue::Null,
        (TypeTag::Boolean, Value::Integer(v)) => EngineValue::Boolean(v != 0),
        (
            TypeTag::TinyInt | TypeTag::SmallInt | TypeTag::Integer | TypeTag::BigInt,
            Value::Integer(v),
        ) => EngineValue::BigInt(v),
        (TypeTag::Decimal, Value::Integer(v)) => EngineValue::Decimal(Decimal::from(v)),
        (TypeTag::Decimal, Value::Real(v)) => EngineValue::Decimal(
            Decimal::from_f64(v)
                .ok_or_else(|| invalid_text("DECIMAL", &v.to_string()))?,
        ),
        (TypeTag::Decimal, Value::Text(text)) => EngineValue::Decimal(
            text.parse()
                .map_err(|_| invalid_text("DECIMAL", &text))?,
        ),
        (TypeTag::Real | TypeTag::Double, Value::Real(v)) => EngineValue::Double(v),
        #[allow(clippy::cast_precision_loss)]
        (TypeTag::Real | TypeTag::Double, Value::Integer(v)) => EngineValue::Double(v as f64),
        (TypeTag::Varchar, Value::Text(text)) => EngineValue::Text(text),
        (TypeTag::Varchar, Value::Integer(v)) => EngineValue::Text(v.to_string()),
        (TypeTag::Varchar, Value::Real(v)) => EngineValue::Text(v.to_string()),
        (TypeTag::Date, Value::Text(text)) => EngineValue::Date(
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| invalid_text("DATE", &text))?,
        ),
        (TypeTag::Time, Value::Text(text)) => EngineValue::Time(
            NaiveTime::parse_from_str(&text, TIME_FORMAT)
                .map_err(|_| invalid_text("TIME", &text))?,
        ),
        (TypeTag::Timestamp, Value::Text(text)) => EngineValue::Timestamp(
            NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
                .map_err(|_| invalid_text("TIMESTAMP", &text))?,
        ),
        (TypeTag::TimestampTz, Value::Text(text)) => EngineValue::TimestampTz(
            DateTime::parse_from_str(&text, TIMESTAMP_TZ_FORMAT)
                .map_err(|_| invalid_text("TIMESTAMP WITH TIME ZONE", &text))?,
        ),
        (TypeTag::Uuid, Value::Text(text)) => EngineValue::Uuid(
            Uuid::parse_str(&text).map_err(|_| invalid_text("UUID", &text))?,
        ),
        (TypeTag::Uuid, Value::Blob(bytes)) => EngineValue::Uuid(
            Uuid::from_slice(&bytes)
                .map_err(|_| invalid_text("UUID", &format!("{} bytes", bytes.len())))?,
        ),
        (TypeTag::Interval(_), Value::Text(text)) => EngineValue::Interval(
            text.parse::<SqlInterval>()
                .map_err(|_| invalid_text("INTERVAL", &text))?,
        ),
        (TypeTag::Binary, Value::Blob(bytes)) => EngineValue::Bytes(bytes),
        (TypeTag::Blob, Value::Blob(bytes)) => {
            EngineValue::Blob(BlobValue::Bytes(Bytes::from(bytes)))
        }
        (TypeTag::Clob, Value::Text(text)) => EngineValue::Clob(ClobValue::Text(text)),
        (_, raw) => raw_value(raw),
    };
    Ok(value)
}

fn raw_value(raw: Value) -> EngineValue {
    match raw {
        Value::Null => EngineValue::Null,
        Value::Integer(v) => EngineValue::BigInt(v),
        Value::Real(v) => EngineValue::Double(v),
        Value::Text(text) => EngineValue::Text(text),
        Value::Blob(bytes) => EngineValue::Bytes(bytes),
    }
}

fn unsupported(what: &str) -> EngineError {
    EngineError::new(
        EngineErrorKind::General,
        0,
        SQL_STATE,
        format!("{what} values are not supported by this engine"),
    )
}

fn invalid_text(expected: &str, text: &str) -> EngineError {
    EngineError::new(
        EngineErrorKind::General,
        0,
        SQL_STATE,
        format!("cannot read stored value '{text}' as {expected}"),
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::value::IntervalQualifier;

    #[test]
    fn declared_types_map_to_tags() {
        assert_eq!(parse_decl("INTEGER").map(|d| d.tag), Some(TypeTag::Integer));
        assert_eq!(parse_decl("bigint").map(|d| d.tag), Some(TypeTag::BigInt));
        assert_eq!(parse_decl("BOOLEAN").map(|d| d.tag), Some(TypeTag::Boolean));
        assert_eq!(
            parse_decl("DOUBLE PRECISION").map(|d| d.tag),
            Some(TypeTag::Double)
        );
        assert_eq!(parse_decl("TEXT").map(|d| d.tag), Some(TypeTag::Varchar));
        assert_eq!(parse_decl("BLOB").map(|d| d.tag), Some(TypeTag::Blob));
        assert_eq!(
            parse_decl("TIMESTAMP WITH TIME ZONE").map(|d| d.tag),
            Some(TypeTag::TimestampTz)
        );
        assert_eq!(parse_decl("FANCY"), None);
    }

    #[test]
    fn declared_precision_and_scale_are_kept() {
        let decimal = parse_decl("DECIMAL(10, 2)").unwrap();
        assert_eq!(decimal.tag, TypeTag::Decimal);
        assert_eq!(decimal.precision, Some(10));
        assert_eq!(decimal.scale, Some(2));

        let varchar = parse_decl("VARCHAR(40)").unwrap();
        assert_eq!(varchar.tag, TypeTag::Varchar);
        assert_eq!(varchar.precision, Some(40));
        assert_eq!(varchar.scale, None);
    }

    #[test]
    fn interval_declarations_keep_their_qualifier() {
        assert_eq!(
            parse_decl("INTERVAL DAY TO SECOND").map(|d| d.tag),
            Some(TypeTag::Interval(IntervalQualifier::DayToSecond))
        );
        assert_eq!(
            parse_decl("interval year to month").map(|d| d.tag),
            Some(TypeTag::Interval(IntervalQualifier::YearToMonth))
        );
        assert_eq!(
            parse_decl("INTERVAL").map(|d| d.tag),
            Some(TypeTag::Interval(IntervalQualifier::Second))
        );
    }

    #[test]
    fn undeclared_columns_infer_from_first_non_null() {
        let rows = vec![
            vec![Value::Null, Value::Null],
            vec![Value::Integer(3), Value::Null],
        ];
        assert_eq!(infer_tag(&rows, 0), TypeTag::BigInt);
        assert_eq!(infer_tag(&rows, 1), TypeTag::Varchar);
    }

    #[test]
    fn temporals_store_as_iso_text_and_read_back() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let stored = to_sqlite_value(EngineValue::Date(date)).unwrap();
        assert_eq!(stored, Value::Text("2024-05-17".into()));
        assert_eq!(
            from_sqlite_value(stored, TypeTag::Date).unwrap(),
            EngineValue::Date(date)
        );
    }

    #[test]
    fn intervals_round_trip_through_their_literal_form() {
        let interval = SqlInterval::new(IntervalQualifier::DayToSecond, false, 1, 7_503_000_000_000);
        let stored = to_sqlite_value(EngineValue::Interval(interval)).unwrap();
        let read = from_sqlite_value(stored, TypeTag::Interval(IntervalQualifier::DayToSecond))
            .unwrap();
        assert_eq!(read, EngineValue::Interval(interval));
    }

    #[test]
    fn booleans_store_as_integers() {
        assert_eq!(
            to_sqlite_value(EngineValue::Boolean(true)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            from_sqlite_value(Value::Integer(0), TypeTag::Boolean).unwrap(),
            EngineValue::Boolean(false)
        );
    }

    #[test]
    fn arrays_are_rejected() {
        let err = to_sqlite_value(EngineValue::Array(vec![])).unwrap_err();
        assert!(err.message.contains("not supported"), "{err}");
    }

    #[test]
    fn mismatched_storage_decays_to_the_raw_shape() {
        assert_eq!(
            from_sqlite_value(Value::Integer(42), TypeTag::Date).unwrap(),
            EngineValue::BigInt(42)
        );
    }
}
