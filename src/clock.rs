//! Fixed-offset clock conversions.
//!
//! The deployment runs on one business timezone expressed as a fixed UTC
//! offset, with no DST rules and no zone database. Conversions are pure and
//! round-trip: `local_date_of(instant_of(d, t)) == d` for any valid `t`.
//!
//! If the deployment's offset is ever changed, dedup records written under
//! the old offset may collide or gap with the new one for a single
//! transition day. Accepted for a single fixed-offset deployment.

use crate::error::{ChimeError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Converter between absolute instants and the deployment's wall clock.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Create a clock for the given fixed UTC offset in minutes (east positive).
    ///
    /// # Errors
    ///
    /// Returns a config error when the offset is out of the ±24 h range.
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            ChimeError::Config(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
        })?;
        Ok(Self { offset })
    }

    /// The local business date at the given instant.
    #[must_use]
    pub fn local_date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The absolute instant of `time` (a `"HH:MM"` wall-clock string) on the
    /// given local date.
    ///
    /// # Errors
    ///
    /// Returns [`ChimeError::InvalidTimeFormat`] unless `time` is a valid
    /// 24-hour `HH:MM` in `[00:00, 23:59]`.
    pub fn instant_of(&self, date: NaiveDate, time: &str) -> Result<DateTime<Utc>> {
        let parsed = parse_wall_time(time)?;
        let local = self
            .offset
            .from_local_datetime(&date.and_time(parsed))
            .single()
            .ok_or_else(|| {
                ChimeError::InvalidTimeFormat(format!("unrepresentable local time: {date} {time}"))
            })?;
        Ok(local.with_timezone(&Utc))
    }

    /// The instant of the next local midnight strictly after `instant`.
    #[must_use]
    pub fn next_local_midnight(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let next_date = self.local_date_of(instant) + Duration::days(1);
        let local = self
            .offset
            .from_local_datetime(&next_date.and_time(NaiveTime::MIN))
            .single()
            .unwrap_or_else(|| instant.with_timezone(&self.offset) + Duration::days(1));
        local.with_timezone(&Utc)
    }
}

/// Strictly parse a `"HH:MM"` wall-clock string.
fn parse_wall_time(time: &str) -> Result<NaiveTime> {
    let invalid = || ChimeError::InvalidTimeFormat(time.to_owned());

    let (hh, mm) = time.split_once(':').ok_or_else(invalid)?;
    if hh.len() != 2 || mm.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = hh.parse().map_err(|_| invalid())?;
    let minute: u32 = mm.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}
