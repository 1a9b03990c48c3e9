//! Fixed-precision duration and timestamp types.
//!
//! Every time computation in this crate runs on integer milliseconds, never
//! `f64`, so the route invariants in the spec hold exactly rather than up to
//! floating-point slop. On the wire, durations are the solver's `"<seconds>s"`
//! strings and timestamps are RFC3339.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in time, always UTC on the wire.
pub type Timestamp = DateTime<Utc>;

/// A signed duration, stored as whole milliseconds.
///
/// Negative durations are representable (the solver uses them as a
/// traffic-infeasibility marker on wait durations; see
/// [`crate::options::PlannerOptions::allow_negative_wait_despite_traffic_infeasibility`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_millis(millis: i64) -> Self {
        Duration(millis)
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Duration((seconds * 1000.0).round() as i64)
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Duration(minutes * 60_000)
    }

    pub fn from_hours(hours: i64) -> Self {
        Duration(hours * 3_600_000)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn as_seconds_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn max(self, other: Self) -> Self {
        Duration(self.0.max(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Duration(self.0.min(other.0))
    }

    /// Parses the solver's `"<seconds>s"` wire format, e.g. `"12.5s"` or `"-30s"`.
    pub fn parse_wire(s: &str) -> Option<Self> {
        let seconds_str = s.strip_suffix('s')?;
        let seconds: f64 = seconds_str.parse().ok()?;
        Some(Duration::from_seconds(seconds))
    }

    /// Renders in the solver's `"<seconds>s"` wire format.
    pub fn to_wire(&self) -> String {
        if self.0 % 1000 == 0 {
            format!("{}s", self.0 / 1000)
        } else {
            format!("{:.3}s", self.0 as f64 / 1000.0)
        }
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Self) -> Self::Output {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Duration {
    type Output = Duration;
    fn neg(self) -> Self::Output {
        Duration(-self.0)
    }
}

impl std::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Duration::ZERO, Add::add)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string like \"12.5s\"")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Duration, E>
            where
                E: de::Error,
            {
                Duration::parse_wire(v).ok_or_else(|| de::Error::custom(format!("invalid duration: {v}")))
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}

/// Adds a [`Duration`] to a [`Timestamp`].
pub fn add_duration(ts: Timestamp, d: Duration) -> Timestamp {
    ts + chrono::Duration::milliseconds(d.as_millis())
}

/// Subtracts two timestamps, returning the elapsed [`Duration`] (`a - b`).
pub fn sub_timestamps(a: Timestamp, b: Timestamp) -> Duration {
    Duration::from_millis((a - b).num_milliseconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_whole_seconds() {
        let d = Duration::parse_wire("120s").unwrap();
        assert_eq!(d.as_millis(), 120_000);
        assert_eq!(d.to_wire(), "120s");
    }

    #[test]
    fn wire_roundtrip_fractional_seconds() {
        let d = Duration::parse_wire("12.5s").unwrap();
        assert_eq!(d.as_millis(), 12_500);
    }

    #[test]
    fn wire_roundtrip_negative() {
        let d = Duration::parse_wire("-30s").unwrap();
        assert!(d.is_negative());
        assert_eq!(d.to_wire(), "-30s");
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Duration::from_seconds(1.1);
        let b = Duration::from_seconds(2.2);
        assert_eq!((a + b).as_millis(), 3300);
    }

    #[test]
    fn rejects_missing_suffix() {
        assert!(Duration::parse_wire("120").is_none());
    }
}
