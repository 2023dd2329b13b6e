//! Time-of-day parsing and the half-open overlap test shared by both checkers.
//!
//! Two ranges overlap when `start1 < end2 && start2 < end1`. Back-to-back
//! ranges (one ends exactly when the other starts) are NOT overlapping.
//!
//! Times are civil wall-clock values with no date or zone attached. The engine
//! works at minute resolution: seconds are accepted on input and dropped.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{ClashError, Result};

/// A same-day civil time window, e.g. 09:00-11:30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "clock")]
    pub start: NaiveTime,
    #[serde(with = "clock")]
    pub end: NaiveTime,
}

impl TimeRange {
    /// Build a range without checking ordering. See [`TimeRange::try_new`].
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build a range, rejecting `start >= end`.
    ///
    /// # Errors
    /// Returns `ClashError::InvalidRange` if the range is empty or reversed.
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(ClashError::InvalidRange {
                start: format_clock_time(start),
                end: format_clock_time(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Strict half-open intersection test.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Minutes shared by the two ranges, or 0 when they do not overlap.
    pub fn overlap_minutes(&self, other: &TimeRange) -> i64 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end - start).num_minutes()
    }
}

/// Minutes since midnight for an `"HH:MM"` or `"HH:MM:SS"` string.
///
/// Hours and minutes are read as plain integers with no range check, and a
/// missing minute component counts as zero. Seconds are ignored. Returns
/// `None` if a component is not a number.
pub fn minutes_since_midnight(time: &str) -> Option<u32> {
    let mut parts = time.split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = match parts.next().map(str::trim) {
        None | Some("") => 0,
        Some(m) => m.parse().ok()?,
    };
    hours.checked_mul(60)?.checked_add(minutes)
}

/// Overlap test on raw time strings.
///
/// Any unparseable input makes the result `false`, so bad legacy data never
/// blocks anything at this level. Typed callers go through
/// [`parse_clock_time`] instead, which rejects such input.
pub fn ranges_overlap(start1: &str, end1: &str, start2: &str, end2: &str) -> bool {
    match (
        minutes_since_midnight(start1),
        minutes_since_midnight(end1),
        minutes_since_midnight(start2),
        minutes_since_midnight(end2),
    ) {
        (Some(s1), Some(e1), Some(s2), Some(e2)) => s1 < e2 && s2 < e1,
        _ => false,
    }
}

/// Strictly parse `"H:MM"`, `"HH:MM"` or `"HH:MM:SS"` into a minute-resolution time.
///
/// # Errors
/// Returns `ClashError::InvalidTime` if the string is malformed or a
/// component is out of range.
pub fn parse_clock_time(time: &str) -> Result<NaiveTime> {
    let invalid = || ClashError::InvalidTime(time.to_string());

    let parts: Vec<&str> = time.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid());
    }

    let numbers = parts
        .iter()
        .map(|p| {
            if p.is_empty() || p.len() > 2 || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            p.parse::<u32>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<u32>>>()?;

    if parts[1].len() != 2 {
        return Err(invalid());
    }
    if let Some(&seconds) = numbers.get(2) {
        if seconds > 59 {
            return Err(invalid());
        }
    }

    NaiveTime::from_hms_opt(numbers[0], numbers[1], 0).ok_or_else(invalid)
}

/// Format a time as `HH:MM`.
pub fn format_clock_time(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Serde adapter storing `NaiveTime` as an `HH:MM` string.
///
/// Accepts anything [`parse_clock_time`] accepts on the way in.
pub mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock_time(&raw).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for optional fields; empty strings read as `None`.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&super::super::format_clock_time(*t)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => super::super::parse_clock_time(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}
