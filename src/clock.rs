use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Single source of local time for the engine. Every "today", "now" and
/// "is in the past" decision routes through this trait so the scheduler and
/// slot generator can be tested against a pinned instant.
pub trait Clock: Send + Sync {
    /// Current wall-clock date and time in the configured local timezone.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Minutes since local midnight.
    fn minutes_of_day(&self) -> i64 {
        let time = self.now().time();
        i64::from(chrono::Timelike::hour(&time)) * 60 + i64::from(chrono::Timelike::minute(&time))
    }
}

/// System clock at a fixed UTC offset. The business runs in one timezone;
/// the offset comes from configuration rather than a tz database lookup.
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
            log::warn!("Invalid TZ_OFFSET_MINUTES {offset_minutes}, falling back to UTC");
            Utc.fix()
        });
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Clock pinned to one instant, for tests.
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_minutes_of_day() {
        let now = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let clock = FixedClock(now);
        assert_eq!(clock.minutes_of_day(), 630);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }
}
