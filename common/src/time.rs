// Time helpers shared across the platform.
//
// Timestamps are plain milliseconds since the Unix epoch. The daily-reset
// boundary is the local midnight of the host process; callers log the exact
// instant whenever a reset fires.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Duration as ChronoDuration, Local};

pub type TimestampMillis = u64;

#[inline]
pub fn get_current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
}

// Return timestamp in milliseconds
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}

// Duration until the next local-midnight boundary of the host process.
// On a DST gap where midnight does not exist locally, the earliest valid
// instant after it is used instead.
pub fn duration_until_local_midnight() -> Duration {
    let now = Local::now();
    let tomorrow = (now + ChronoDuration::days(1)).date_naive();
    let midnight = tomorrow
        .and_hms_opt(0, 0, 0)
        .expect("00:00:00 is always a valid time of day");

    let next = match midnight.and_local_timezone(Local) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(earliest, _) => earliest,
        // skipped by a DST transition, fall back to one hour later
        chrono::LocalResult::None => match (midnight + ChronoDuration::hours(1))
            .and_local_timezone(Local)
        {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
            chrono::LocalResult::None => now + ChronoDuration::days(1),
        },
    };

    (next - now).to_std().unwrap_or(Duration::from_secs(1))
}
