//! Instants and durations, measured in whole seconds since the Unix epoch.

use std::{fmt, ops::Deref, str::FromStr, time::Duration};

use jiff::{Span, SpanRelativeTo, Timestamp};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};

use crate::error::Fatal;

/// A point in time, represented the same way BIND9 represents `isc_stdtime_t`:
/// whole seconds since the Unix epoch, unsigned and 32 bits wide.
///
/// Arithmetic on `Instant` is always checked; the scheduler and generator
/// only perform a subtraction or addition where an invariant of the caller
/// guarantees it cannot overflow or underflow, and turn a violation into
/// [`Fatal::Invariant`] rather than panicking.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Instant(u32);

impl Instant {
    pub const fn new(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u32 {
        self.0
    }

    pub fn checked_add(self, secs: u32) -> Option<Self> {
        self.0.checked_add(secs).map(Self)
    }

    pub fn checked_sub(self, secs: u32) -> Option<Self> {
        self.0.checked_sub(secs).map(Self)
    }

    /// The current wall-clock time, truncated to whole seconds.
    pub fn now() -> Result<Self, Fatal> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| Fatal::Invariant(format!("system clock is before the Unix epoch: {e}")))?
            .as_secs();
        u32::try_from(secs)
            .map(Self)
            .map_err(|_| Fatal::Invariant("system clock is too far in the future".into()))
    }

    /// The compact `YYYYMMDDHHMMSS` form `dnssec-ksr` uses for bundle headers
    /// and is therefore the natural choice for `Display`.
    fn to_zoned(self) -> jiff::Zoned {
        Timestamp::from_second(i64::from(self.0))
            .unwrap_or(Timestamp::UNIX_EPOCH)
            .to_zoned(jiff::tz::TimeZone::UTC)
    }

    /// A human-readable `ctime`-style rendering, used alongside the compact
    /// form in bundle headers.
    pub fn ctime_string(self) -> String {
        self.to_zoned().strftime("%a %b %e %T %Y").to_string()
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_zoned().strftime("%Y%m%d%H%M%S"))
    }
}

/// Parses a `-i`/`-e` "when" argument: either an absolute time, given as an
/// RFC 3339 timestamp or a bare count of seconds since the epoch, or an
/// offset from `now`, given as `+`/`-` followed by a [`Span`] accepted by
/// [`TimeSpan`].
pub fn parse_when(s: &str, now: Instant) -> Result<Instant, Fatal> {
    if let Some(rest) = s.strip_prefix('+') {
        let offset = parse_seconds(rest)?;
        return now
            .checked_add(offset)
            .ok_or_else(|| Fatal::Usage(format!("offset '{s}' overflows")));
    }
    if let Some(rest) = s.strip_prefix('-') {
        let offset = parse_seconds(rest)?;
        return now
            .checked_sub(offset)
            .ok_or_else(|| Fatal::Usage(format!("offset '{s}' underflows")));
    }
    if let Ok(secs) = s.parse::<u32>() {
        return Ok(Instant::new(secs));
    }
    let ts: Timestamp = s
        .parse()
        .map_err(|e| Fatal::Usage(format!("'{s}' is neither a timestamp nor an offset: {e}")))?;
    u32::try_from(ts.as_second())
        .map(Instant::new)
        .map_err(|_| Fatal::Usage(format!("'{s}' is out of range")))
}

fn parse_seconds(s: &str) -> Result<u32, Fatal> {
    TimeSpan::from_str(s)
        .map_err(Fatal::Usage)
        .and_then(|span| {
            u32::try_from(span.duration().as_secs())
                .map_err(|_| Fatal::Usage(format!("duration '{s}' is too large")))
        })
}

/// A wrapper around [`Duration`] with fancier (de)serialization: accepts
/// either a bare integer number of seconds or a human-readable span such as
/// `"30d"` or `"2h 3m 4s"`.
#[derive(Copy, Clone, Debug)]
pub struct TimeSpan {
    duration: Duration,
}

impl Deref for TimeSpan {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.duration
    }
}

impl TimeSpan {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    /// The duration, truncated to whole seconds and narrowed to `u32`, the
    /// width every timing quantity in the scheduler is carried in.
    pub fn as_secs_u32(&self) -> Result<u32, Fatal> {
        u32::try_from(self.duration.as_secs())
            .map_err(|_| Fatal::Configuration("duration is too large".into()))
    }
}

impl TryFrom<Span> for TimeSpan {
    type Error = String;

    fn try_from(value: Span) -> Result<Self, Self::Error> {
        let signed = value
            .to_duration(SpanRelativeTo::days_are_24_hours())
            .map_err(|e| format!("unable to convert duration: {e}"))?;
        let duration =
            Duration::try_from(signed).map_err(|e| format!("unable to convert duration: {e}"))?;
        Ok(Self { duration })
    }
}

impl FromStr for TimeSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(Self::from_secs(secs));
        }
        let span: Span = s
            .parse()
            .map_err(|e| format!("unable to parse '{s}' as a duration: {e}"))?;
        Self::try_from(span)
    }
}

impl PartialEq for TimeSpan {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}

impl Eq for TimeSpan {}

struct TimeSpanVisitor;

impl<'de> Visitor<'de> for TimeSpanVisitor {
    type Value = TimeSpan;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a duration, as a bare integer of seconds or a human-readable span")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        FromStr::from_str(value).map_err(E::custom)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(TimeSpan::from_secs(value.try_into().map_err(|_| {
            E::custom("duration value must be non-negative")
        })?))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(TimeSpan::from_secs(value))
    }
}

impl<'de> Deserialize<'de> for TimeSpan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimeSpanVisitor)
    }
}

impl Serialize for TimeSpan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.duration.as_secs().serialize(serializer)
    }
}
