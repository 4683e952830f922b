//! When a queued digest becomes due.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use docketcc_common::DigestType;

/// Local hour at which daily and weekly digests go out.
pub const DIGEST_HOUR: u32 = 8;

pub fn scheduled_for(digest_type: DigestType, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    match digest_type {
        DigestType::Immediate | DigestType::SeedDigest => now,
        DigestType::Daily => next_daily(now, tz),
        DigestType::Weekly => next_weekly(now, tz),
    }
}

/// The next `DIGEST_HOUR`:00 local strictly after `now`.
pub fn next_daily(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let candidate = at_digest_hour(today, tz);
    if candidate > now {
        candidate
    } else {
        at_digest_hour(today + Duration::days(1), tz)
    }
}

/// The next Monday `DIGEST_HOUR`:00 local strictly after `now`.
pub fn next_weekly(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let days_ahead = (7 + Weekday::Mon.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = at_digest_hour(today + Duration::days(days_ahead), tz);
    if candidate > now {
        candidate
    } else {
        at_digest_hour(today + Duration::days(days_ahead + 7), tz)
    }
}

fn at_digest_hour(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let Some(mut naive) = date.and_hms_opt(DIGEST_HOUR, 0, 0) else {
        return date.and_time(NaiveTime::MIN).and_utc();
    };
    // A local time inside a DST gap doesn't exist; step forward until it does.
    for _ in 0..3 {
        if let Some(local) = tz.from_local_datetime(&naive).earliest() {
            return local.with_timezone(&Utc);
        }
        naive += Duration::hours(1);
    }
    naive.and_utc()
}
