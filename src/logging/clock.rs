//! Timestamp formatting and index naming for log records.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Format of the human-readable `timestamp` field
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

/// Clock bound to the configured timezone.
///
/// Built once at startup from `logging.timezone` and shared by every
/// request-scoped logger, so no process-global timezone is consulted. The
/// offset is resolved for each instant, so DST transitions are honoured by
/// `Local` and `Named` clocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogClock {
    Fixed(FixedOffset),
    Local,
    Named(Tz),
}

impl LogClock {
    pub fn utc() -> Self {
        LogClock::Fixed(Utc.fix())
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.at(Utc::now())
    }

    /// The instant `utc` as wall-clock time in this clock's zone.
    pub fn at(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            LogClock::Fixed(offset) => utc.with_timezone(offset),
            LogClock::Local => to_fixed(utc.with_timezone(&Local)),
            LogClock::Named(tz) => to_fixed(utc.with_timezone(tz)),
        }
    }
}

fn to_fixed<Z: TimeZone>(at: DateTime<Z>) -> DateTime<FixedOffset> {
    let offset = at.offset().fix();
    at.with_timezone(&offset)
}

/// Render a record timestamp in the clock's local time.
pub fn format_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Index name for records written on `date`, e.g. `monorepo-logs-2024-05`.
pub fn index_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{:04}-{:02}", prefix, date.year(), date.month())
}
