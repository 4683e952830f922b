use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// How aggressively to poll on this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingStrategy {
    pub should_process: bool,
    pub lookback_hours: i64,
    pub batch_size: usize,
}

impl ProcessingStrategy {
    const fn new(should_process: bool, lookback_hours: i64, batch_size: usize) -> Self {
        Self {
            should_process,
            lookback_hours,
            batch_size,
        }
    }
}

/// Start of business: first poll of the day catches up on overnight filings.
const MORNING_CATCH_UP: ProcessingStrategy = ProcessingStrategy::new(true, 12, 10);
const BUSINESS_HOURS: ProcessingStrategy = ProcessingStrategy::new(true, 2, 5);
const EVENING: ProcessingStrategy = ProcessingStrategy::new(true, 4, 3);
const QUIET: ProcessingStrategy = ProcessingStrategy::new(false, 0, 0);

/// Hour of day (0-23) of `now` in `tz`. The offset is resolved per call, so
/// DST transitions need no special handling.
pub fn local_hour(now: DateTime<Utc>, tz: Tz) -> u32 {
    now.with_timezone(&tz).hour()
}

pub fn processing_strategy(now: DateTime<Utc>, tz: Tz) -> ProcessingStrategy {
    strategy_for_hour(local_hour(now, tz))
}

pub fn strategy_for_hour(hour: u32) -> ProcessingStrategy {
    match hour {
        8 => MORNING_CATCH_UP,
        9..=17 => BUSINESS_HOURS,
        18..=21 => EVENING,
        _ => QUIET,
    }
}
