use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::SqlBridgeError;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// SQL interval qualifier, one variant per legal field combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalQualifier {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    YearToMonth,
    DayToHour,
    DayToMinute,
    DayToSecond,
    HourToMinute,
    HourToSecond,
    MinuteToSecond,
}

impl IntervalQualifier {
    /// True for qualifiers made of year/month fields.
    #[must_use]
    pub fn is_year_month(self) -> bool {
        matches!(self, Self::Year | Self::Month | Self::YearToMonth)
    }

    /// True for qualifiers made of day/hour/minute/second fields.
    #[must_use]
    pub fn is_day_time(self) -> bool {
        !self.is_year_month()
    }

    /// The SQL spelling, e.g. `DAY TO SECOND`.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Year => "YEAR",
            Self::Month => "MONTH",
            Self::Day => "DAY",
            Self::Hour => "HOUR",
            Self::Minute => "MINUTE",
            Self::Second => "SECOND",
            Self::YearToMonth => "YEAR TO MONTH",
            Self::DayToHour => "DAY TO HOUR",
            Self::DayToMinute => "DAY TO MINUTE",
            Self::DayToSecond => "DAY TO SECOND",
            Self::HourToMinute => "HOUR TO MINUTE",
            Self::HourToSecond => "HOUR TO SECOND",
            Self::MinuteToSecond => "MINUTE TO SECOND",
        }
    }

    /// Inverse of [`as_sql`](Self::as_sql), case-insensitive.
    #[must_use]
    pub fn from_sql(text: &str) -> Option<Self> {
        let normalized = text.trim().to_ascii_uppercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.as_str() {
            "YEAR" => Some(Self::Year),
            "MONTH" => Some(Self::Month),
            "DAY" => Some(Self::Day),
            "HOUR" => Some(Self::Hour),
            "MINUTE" => Some(Self::Minute),
            "SECOND" => Some(Self::Second),
            "YEAR TO MONTH" => Some(Self::YearToMonth),
            "DAY TO HOUR" => Some(Self::DayToHour),
            "DAY TO MINUTE" => Some(Self::DayToMinute),
            "DAY TO SECOND" => Some(Self::DayToSecond),
            "HOUR TO MINUTE" => Some(Self::HourToMinute),
            "HOUR TO SECOND" => Some(Self::HourToSecond),
            "MINUTE TO SECOND" => Some(Self::MinuteToSecond),
            _ => None,
        }
    }
}

/// A span of years and months, the year-month counterpart to a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthSpan {
    pub years: i32,
    pub months: i32,
}

impl MonthSpan {
    #[must_use]
    pub fn new(years: i32, months: i32) -> Self {
        Self { years, months }
    }

    #[must_use]
    pub fn of_months(months: i32) -> Self {
        Self { years: 0, months }
    }

    #[must_use]
    pub fn total_months(self) -> i64 {
        i64::from(self.years) * 12 + i64::from(self.months)
    }
}

/// SQL `INTERVAL` value: a qualifier, a sign, and two unsigned magnitudes.
///
/// `leading` holds the first field of the qualifier (years, days, ...).
/// `remaining` holds everything below it collapsed into the smallest unit:
/// months for `YEAR TO MONTH`, hours for `DAY TO HOUR`, minutes for
/// `DAY TO MINUTE` and `HOUR TO MINUTE`, and nanoseconds whenever the
/// qualifier reaches seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlInterval {
    pub qualifier: IntervalQualifier,
    pub negative: bool,
    pub leading: u64,
    pub remaining: u64,
}

impl SqlInterval {
    /// Builds an interval, normalizing the sign of zero.
    #[must_use]
    pub fn new(qualifier: IntervalQualifier, negative: bool, leading: u64, remaining: u64) -> Self {
        let negative = negative && (leading != 0 || remaining != 0);
        Self {
            qualifier,
            negative,
            leading,
            remaining,
        }
    }

    /// Converts a duration into a `SECOND` interval, preserving nanoseconds.
    #[must_use]
    pub fn from_duration(duration: TimeDelta) -> Self {
        let seconds = duration.num_seconds();
        let sub = duration - TimeDelta::seconds(seconds);
        let nanos = sub.num_nanoseconds().unwrap_or(0);
        let negative = seconds < 0 || nanos < 0;
        Self::new(
            IntervalQualifier::Second,
            negative,
            seconds.unsigned_abs(),
            nanos.unsigned_abs(),
        )
    }

    /// Converts a year-month span into a `YEAR TO MONTH` interval.
    #[must_use]
    pub fn from_month_span(span: MonthSpan) -> Self {
        let total = span.total_months();
        Self::new(
            IntervalQualifier::YearToMonth,
            total < 0,
            total.unsigned_abs() / 12,
            total.unsigned_abs() % 12,
        )
    }

    /// Collapses a day-time interval into a duration.
    ///
    /// # Errors
    ///
    /// Fails on year-month qualifiers (their length in seconds is undefined)
    /// and when the result overflows the duration range.
    pub fn to_duration(&self) -> Result<TimeDelta, SqlBridgeError> {
        if self.qualifier.is_year_month() {
            return Err(SqlBridgeError::ConversionError(format!(
                "interval {} has no fixed length in seconds",
                self.qualifier.as_sql()
            )));
        }
        let (seconds, nanos) = self.seconds_and_nanos()?;
        let signed_seconds = apply_sign(self.negative, seconds)?;
        let signed_nanos = apply_sign(self.negative, nanos)?;
        TimeDelta::try_seconds(signed_seconds)
            .and_then(|base| base.checked_add(&TimeDelta::nanoseconds(signed_nanos)))
            .ok_or_else(|| {
                SqlBridgeError::ConversionError(format!("interval {self} out of duration range"))
            })
    }

    /// Collapses a year-month interval into a [`MonthSpan`].
    ///
    /// # Errors
    ///
    /// Fails on day-time qualifiers and on month counts outside `i32`.
    pub fn to_month_span(&self) -> Result<MonthSpan, SqlBridgeError> {
        let months_magnitude = match self.qualifier {
            IntervalQualifier::Year => self.leading.checked_mul(12),
            IntervalQualifier::Month => Some(self.leading),
            IntervalQualifier::YearToMonth => self
                .leading
                .checked_mul(12)
                .and_then(|m| m.checked_add(self.remaining)),
            _ => {
                return Err(SqlBridgeError::ConversionError(format!(
                    "interval {} has no year-month representation",
                    self.qualifier.as_sql()
                )));
            }
        };
        let total = months_magnitude
            .and_then(|m| i64::try_from(m).ok())
            .map(|m| if self.negative { -m } else { m })
            .ok_or_else(|| {
                SqlBridgeError::ConversionError(format!("interval {self} out of month range"))
            })?;
        let years = i32::try_from(total / 12).map_err(|_| {
            SqlBridgeError::ConversionError(format!("interval {self} out of month range"))
        })?;
        let months = i32::try_from(total % 12).map_err(|_| {
            SqlBridgeError::ConversionError(format!("interval {self} out of month range"))
        })?;
        Ok(MonthSpan { years, months })
    }

    // (whole seconds, leftover nanoseconds), unsigned. Day-time qualifiers only.
    fn seconds_and_nanos(&self) -> Result<(u64, u64), SqlBridgeError> {
        let overflow = || {
            SqlBridgeError::ConversionError(format!(
                "interval magnitude too large: {} {}",
                self.leading,
                self.qualifier.as_sql()
            ))
        };
        let leading_seconds = |unit: u64| self.leading.checked_mul(unit).ok_or_else(overflow);
        match self.qualifier {
            IntervalQualifier::Day => Ok((leading_seconds(86_400)?, 0)),
            IntervalQualifier::Hour => Ok((leading_seconds(3_600)?, 0)),
            IntervalQualifier::Minute => Ok((leading_seconds(60)?, 0)),
            IntervalQualifier::Second => Ok((self.leading, self.remaining)),
            IntervalQualifier::DayToHour => Ok((
                leading_seconds(86_400)?
                    .checked_add(self.remaining.checked_mul(3_600).ok_or_else(overflow)?)
                    .ok_or_else(overflow)?,
                0,
            )),
            IntervalQualifier::DayToMinute => Ok((
                leading_seconds(86_400)?
                    .checked_add(self.remaining.checked_mul(60).ok_or_else(overflow)?)
                    .ok_or_else(overflow)?,
                0,
            )),
            IntervalQualifier::DayToSecond => split_nanos(leading_seconds(86_400)?, self.remaining),
            IntervalQualifier::HourToMinute => Ok((
                leading_seconds(3_600)?
                    .checked_add(self.remaining.checked_mul(60).ok_or_else(overflow)?)
                    .ok_or_else(overflow)?,
                0,
            )),
            IntervalQualifier::HourToSecond => split_nanos(leading_seconds(3_600)?, self.remaining),
            IntervalQualifier::MinuteToSecond => split_nanos(leading_seconds(60)?, self.remaining),
            _ => unreachable!("year-month qualifiers are rejected above"),
        }
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        match self.qualifier {
            IntervalQualifier::Year
            | IntervalQualifier::Month
            | IntervalQualifier::Day
            | IntervalQualifier::Hour
            | IntervalQualifier::Minute => write!(f, "{}", self.leading),
            IntervalQualifier::Second => write_seconds(f, self.leading, self.remaining),
            IntervalQualifier::YearToMonth => write!(f, "{}-{}", self.leading, self.remaining),
            IntervalQualifier::DayToHour => write!(f, "{} {:02}", self.leading, self.remaining),
            IntervalQualifier::DayToMinute => write!(
                f,
                "{} {:02}:{:02}",
                self.leading,
                self.remaining / 60,
                self.remaining % 60
            ),
            IntervalQualifier::DayToSecond => {
                let seconds = self.remaining / NANOS_PER_SECOND;
                let nanos = self.remaining % NANOS_PER_SECOND;
                write!(f, "{} {:02}:{:02}:", self.leading, seconds / 3_600, (seconds / 60) % 60)?;
                write_padded_seconds(f, seconds % 60, nanos)
            }
            IntervalQualifier::HourToMinute => {
                write!(f, "{}:{:02}", self.leading, self.remaining)
            }
            IntervalQualifier::HourToSecond => {
                let seconds = self.remaining / NANOS_PER_SECOND;
                let nanos = self.remaining % NANOS_PER_SECOND;
                write!(f, "{}:{:02}:", self.leading, seconds / 60)?;
                write_padded_seconds(f, seconds % 60, nanos)
            }
            IntervalQualifier::MinuteToSecond => {
                let seconds = self.remaining / NANOS_PER_SECOND;
                let nanos = self.remaining % NANOS_PER_SECOND;
                write!(f, "{}:", self.leading)?;
                write_padded_seconds(f, seconds, nanos)
            }
        }
    }
}

fn split_nanos(base_seconds: u64, nanos: u64) -> Result<(u64, u64), SqlBridgeError> {
    base_seconds
        .checked_add(nanos / NANOS_PER_SECOND)
        .map(|secs| (secs, nanos % NANOS_PER_SECOND))
        .ok_or_else(|| SqlBridgeError::ConversionError("interval magnitude too large".into()))
}

fn apply_sign(negative: bool, magnitude: u64) -> Result<i64, SqlBridgeError> {
    let out_of_range =
        || SqlBridgeError::ConversionError("interval out of duration range".into());
    if negative {
        i64::try_from(magnitude).map(|v| -v).map_err(|_| out_of_range())
    } else {
        i64::try_from(magnitude).map_err(|_| out_of_range())
    }
}

fn write_seconds(f: &mut fmt::Formatter<'_>, seconds: u64, nanos: u64) -> fmt::Result {
    write!(f, "{seconds}")?;
    write_fraction(f, nanos)
}

fn write_padded_seconds(f: &mut fmt::Formatter<'_>, seconds: u64, nanos: u64) -> fmt::Result {
    write!(f, "{seconds:02}")?;
    write_fraction(f, nanos)
}

fn write_fraction(f: &mut fmt::Formatter<'_>, nanos: u64) -> fmt::Result {
    if nanos == 0 {
        return Ok(());
    }
    let digits = format!("{nanos:09}");
    write!(f, ".{}", digits.trim_end_matches('0'))
}

impl fmt::Display for SqlInterval {
    /// Formats as a SQL literal, e.g. `INTERVAL '1 02:03:04.5' DAY TO SECOND`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("INTERVAL '")?;
        self.write_body(f)?;
        write!(f, "' {}", self.qualifier.as_sql())
    }
}

impl FromStr for SqlInterval {
    type Err = SqlBridgeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_interval(text)
            .ok_or_else(|| SqlBridgeError::ConversionError(format!("malformed interval literal: {text}")))
    }
}

fn parse_interval(text: &str) -> Option<SqlInterval> {
    let trimmed = text.trim();
    let rest = strip_keyword(trimmed, "INTERVAL")?;
    let rest = rest.trim_start();
    let (body, after_body) = take_quoted(rest)?;
    let qualifier = IntervalQualifier::from_sql(after_body)?;

    let body = body.trim();
    let (negative, body) = match body.strip_prefix('-') {
        Some(stripped) => (true, stripped),
        None => (false, body),
    };

    let (leading, remaining) = parse_body(qualifier, body)?;
    Some(SqlInterval::new(qualifier, negative, leading, remaining))
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    if text.len() >= keyword.len() && text[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(&text[keyword.len()..])
    } else {
        None
    }
}

fn take_quoted(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some((&rest[..end], &rest[end + 1..]))
}

fn parse_body(qualifier: IntervalQualifier, body: &str) -> Option<(u64, u64)> {
    match qualifier {
        IntervalQualifier::Year
        | IntervalQualifier::Month
        | IntervalQualifier::Day
        | IntervalQualifier::Hour
        | IntervalQualifier::Minute => Some((body.parse().ok()?, 0)),
        IntervalQualifier::Second => {
            let (seconds, nanos) = parse_seconds(body)?;
            Some((seconds, nanos))
        }
        IntervalQualifier::YearToMonth => {
            let (years, months) = body.split_once('-')?;
            Some((years.parse().ok()?, months.parse().ok()?))
        }
        IntervalQualifier::DayToHour => {
            let (days, hours) = body.split_once(' ')?;
            Some((days.parse().ok()?, hours.trim().parse().ok()?))
        }
        IntervalQualifier::DayToMinute => {
            let (days, clock) = body.split_once(' ')?;
            let (hours, minutes) = clock.trim().split_once(':')?;
            let total: u64 = hours.parse::<u64>().ok()?.checked_mul(60)?;
            Some((days.parse().ok()?, total.checked_add(minutes.parse().ok()?)?))
        }
        IntervalQualifier::DayToSecond => {
            let (days, clock) = body.split_once(' ')?;
            let nanos = parse_clock_nanos(clock.trim(), 3)?;
            Some((days.parse().ok()?, nanos))
        }
        IntervalQualifier::HourToMinute => {
            let (hours, minutes) = body.split_once(':')?;
            Some((hours.parse().ok()?, minutes.parse().ok()?))
        }
        IntervalQualifier::HourToSecond => {
            let (hours, clock) = body.split_once(':')?;
            let nanos = parse_clock_nanos(clock, 2)?;
            Some((hours.parse().ok()?, nanos))
        }
        IntervalQualifier::MinuteToSecond => {
            let (minutes, seconds) = body.split_once(':')?;
            let (secs, nanos) = parse_seconds(seconds)?;
            Some((minutes.parse().ok()?, secs.checked_mul(NANOS_PER_SECOND)?.checked_add(nanos)?))
        }
    }
}

// "02:03:04.5" (fields == 3) or "03:04.5" (fields == 2) into nanoseconds.
fn parse_clock_nanos(clock: &str, fields: usize) -> Option<u64> {
    let mut parts = clock.splitn(fields, ':');
    let mut seconds: u64 = 0;
    for _ in 0..fields - 1 {
        seconds = seconds
            .checked_mul(60)?
            .checked_add(parts.next()?.parse().ok()?)?;
    }
    let (last_seconds, nanos) = parse_seconds(parts.next()?)?;
    seconds
        .checked_mul(60)?
        .checked_add(last_seconds)?
        .checked_mul(NANOS_PER_SECOND)?
        .checked_add(nanos)
}

fn parse_seconds(text: &str) -> Option<(u64, u64)> {
    match text.split_once('.') {
        None => Some((text.parse().ok()?, 0)),
        Some((whole, frac)) => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let mut nanos: u64 = frac.parse().ok()?;
            for _ in frac.len()..9 {
                nanos *= 10;
            }
            Some((whole.parse().ok()?, nanos))
        }
    }
}
