use chrono::Utc;
use chrono_tz::Tz;

use crate::error::SqlBridgeError;
use crate::value::{EngineValue, HostType, HostValue, SqlInterval, TypeTag};

use super::{Codec, Codecs, mismatch, wrong_host};

macro_rules! plain_temporal_codec {
    ($name:ident, $host:ident, $tag:ident, $label:literal) => {
        pub(super) struct $name;

        impl Codec for $name {
            fn host_type(&self) -> HostType {
                HostType::$host
            }

            fn claims(&self, tag: &TypeTag) -> bool {
                matches!(tag, TypeTag::$tag)
            }

            fn decode(
                &self,
                value: &EngineValue,
                _codecs: &Codecs,
            ) -> Result<HostValue, SqlBridgeError> {
                match value {
                    EngineValue::$tag(v) => Ok(HostValue::$host(*v)),
                    other => Err(mismatch($label, other)),
                }
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

plain_temporal_codec!(DateCodec, Date, Date, "date");
plain_temporal_codec!(TimeCodec, Time, Time, "time");
plain_temporal_codec!(TimestampCodec, Timestamp, Timestamp, "timestamp");
plain_temporal_codec!(
    OffsetTimestampCodec,
    OffsetTimestamp,
    TimestampTz,
    "zoned timestamp"
);

/// Zone-aware timestamps. The engine only keeps an offset, so decoding
/// anchors the instant to UTC; the instant survives, the wall zone does not.
pub(super) struct ZonedTimestampCodec;

impl Codec for ZonedTimestampCodec {
    fn host_type(&self) -> HostType {
        HostType::ZonedTimestamp
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::TimestampTz)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::TimestampTz(v) => {
                Ok(HostValue::ZonedTimestamp(v.with_timezone(&Tz::UTC)))
            }
            other => Err(mismatch("zoned timestamp", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::ZonedTimestamp(v) => Ok(EngineValue::TimestampTz(v.fixed_offset())),
            other => Err(wrong_host(HostType::ZonedTimestamp, &other)),
        }
    }
}

pub(super) struct InstantCodec;

impl Codec for InstantCodec {
    fn host_type(&self) -> HostType {
        HostType::Instant
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::TimestampTz)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::TimestampTz(v) => Ok(HostValue::Instant(v.with_timezone(&Utc))),
            other => Err(mismatch("zoned timestamp", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Instant(v) => Ok(EngineValue::TimestampTz(v.fixed_offset())),
            other => Err(wrong_host(HostType::Instant, &other)),
        }
    }
}

/// The engine's interval value verbatim, any qualifier.
pub(super) struct IntervalCodec;

impl Codec for IntervalCodec {
    fn host_type(&self) -> HostType {
        HostType::Interval
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Interval(_))
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Interval(v) => Ok(HostValue::Interval(v.clone())),
            other => Err(mismatch("interval", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Interval(v) => Ok(EngineValue::Interval(v)),
            other => Err(wrong_host(HostType::Interval, &other)),
        }
    }
}

/// Year-month intervals as calendar spans.
pub(super) struct MonthSpanCodec;

impl Codec for MonthSpanCodec {
    fn host_type(&self) -> HostType {
        HostType::MonthSpan
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Interval(qualifier) if qualifier.is_year_month())
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Interval(v) => v.to_month_span().map(HostValue::MonthSpan),
            other => Err(mismatch("year-month interval", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::MonthSpan(v) => Ok(EngineValue::Interval(SqlInterval::from_month_span(v))),
            other => Err(wrong_host(HostType::MonthSpan, &other)),
        }
    }
}

/// Day-time intervals as exact durations.
pub(super) struct DurationCodec;

impl Codec for DurationCodec {
    fn host_type(&self) -> HostType {
        HostType::Duration
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Interval(qualifier) if qualifier.is_day_time())
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Interval(v) => v.to_duration().map(HostValue::Duration),
            other => Err(mismatch("day-time interval", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Duration(v) => Ok(EngineValue::Interval(SqlInterval::from_duration(v))),
            other => Err(wrong_host(HostType::Duration, &other)),
        }
    }
}
