//! Eastern-time session gates.
//!
//! Every rule in this strategy is defined in US/Eastern wall-clock terms:
//! the overnight bar closes at 03:00 ET, entries are allowed in two fixed
//! windows, and the hard time stop fires at a fixed ET clock time. All
//! checks here are pure functions of a timestamp so they can be driven by
//! replayed as well as live data.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// One intraday range during which entries may be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl EntryWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        EntryWindow { start, end }
    }

    pub fn contains(&self, clock: NaiveTime) -> bool {
        self.start <= clock && clock <= self.end
    }
}

impl std::fmt::Display for EntryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

pub fn to_eastern(ts: DateTime<Utc>) -> DateTime<Tz> {
    ts.with_timezone(&New_York)
}

/// The ET calendar date, used as the rollover key for daily state.
pub fn trading_day(ts: DateTime<Utc>) -> NaiveDate {
    to_eastern(ts).date_naive()
}

/// Regular session: 09:30-16:00 ET.
pub fn is_regular_session(ts: DateTime<Utc>) -> bool {
    let clock = to_eastern(ts).time();
    let open = NaiveTime::from_hms_opt(9, 30, 0).expect("static clock time");
    let close = NaiveTime::from_hms_opt(16, 0, 0).expect("static clock time");
    open <= clock && clock < close
}

pub fn in_entry_window(ts: DateTime<Utc>, windows: &[EntryWindow]) -> bool {
    let clock = to_eastern(ts).time();
    windows.iter().any(|w| w.contains(clock))
}

/// The overnight bar close gate: 03:00:00-03:00:30 ET. The classifier only
/// accepts a 12-hour bar whose close timestamp passes this gate.
pub fn is_overnight_close_gate(ts: DateTime<Utc>) -> bool {
    let et = to_eastern(ts);
    et.time().hour() == 3 && et.time().minute() == 0 && et.time().second() < 30
}

/// Whether the ET wall clock has reached the given time.
pub fn at_or_after(ts: DateTime<Utc>, clock: NaiveTime) -> bool {
    to_eastern(ts).time() >= clock
}

/// Five-minute bucket index. ET offsets are whole hours, so UTC epoch
/// buckets align with ET :00/:05/... candle boundaries.
pub fn five_minute_bucket(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(300)
}
