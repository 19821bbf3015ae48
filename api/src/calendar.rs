//! Repeat-day arithmetic for rolling trips forward.
//!
//! Weekdays are indexed with Monday at 0 and Sunday at 6, matching the
//! `repeat_days` bitmap on a trip. All occurrence math happens in the trip's
//! own time zone so that the user's requested wall-clock time survives
//! daylight-savings transitions.

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

pub const DAYS_PER_WEEK: usize = 7;

/// Index of a weekday with Monday as 0.
pub fn monday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

/// The next set day after `prev`, scanning forward and wrapping around the
/// week. Returns `prev` itself when no day is set.
pub fn next_active_day(prev: usize, repeat_days: &[bool; DAYS_PER_WEEK]) -> usize {
    let mut day = (prev + 1) % DAYS_PER_WEEK;
    while day != prev {
        if repeat_days[day] {
            return day;
        }
        day = (day + 1) % DAYS_PER_WEEK;
    }
    prev
}

/// Days from `current` forward to `target` within a week of length `week`.
pub fn days_until(current: usize, target: usize, week: usize) -> u64 {
    ((target + week - current) % week) as u64
}

/// The instant of the next active occurrence after `last_notification`.
///
/// The returned instant falls on the civil date `now + days_until(today,
/// next_active_day)` and carries the wall-clock time of `anchor`, evaluated
/// in `anchor`'s zone. All three inputs must already be in the trip's zone.
pub fn next_occurrence(
    now: DateTime<Tz>,
    last_notification: DateTime<Tz>,
    anchor: DateTime<Tz>,
    repeat_days: &[bool; DAYS_PER_WEEK],
) -> i64 {
    let prev_day = monday_index(last_notification.weekday());
    let next_day = next_active_day(prev_day, repeat_days);
    let today = monday_index(now.weekday());
    let delta = days_until(today, next_day, DAYS_PER_WEEK);
    let date = now
        .date_naive()
        .checked_add_days(Days::new(delta))
        .unwrap_or_else(|| now.date_naive());
    civil_instant(anchor.timezone(), date, anchor.time())
}

/// Resolve a civil date and time-of-day in `tz` to an instant.
///
/// Ambiguous readings (clocks rolled back) take the earlier offset; readings
/// inside a spring-forward gap take the earliest valid time after the gap.
pub fn civil_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> i64 {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earlier, _) => earlier.timestamp_millis(),
        LocalResult::None => {
            let mut shifted = naive + Duration::minutes(30);
            loop {
                if let Some(dt) = tz.from_local_datetime(&shifted).earliest() {
                    return dt.timestamp_millis();
                }
                shifted += Duration::minutes(30);
            }
        }
    }
}

/// Rebase a stored instant onto a new civil date, keeping its time of day.
///
/// Returns `ms` with year/month/day replaced by those of `new_date_ms`
/// (both read in `tz`); hour, minute, second and fraction are preserved.
pub fn with_date_of(ms: i64, new_date_ms: i64, tz: Tz) -> i64 {
    let new_date = crate::models::instant(new_date_ms).with_timezone(&tz).date_naive();
    let time = crate::models::instant(ms).with_timezone(&tz).time();
    civil_instant(tz, new_date, time)
}

/// Whether two instants fall on the same civil date in `tz`.
pub fn same_civil_date(a_ms: i64, b_ms: i64, tz: Tz) -> bool {
    let a = crate::models::instant(a_ms).with_timezone(&tz);
    let b = crate::models::instant(b_ms).with_timezone(&tz);
    a.date_naive() == b.date_naive()
}
