use {
    chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Weekday},
    chrono_tz::Tz,
    tracing::warn,
};

use herald_config::TradingDayConfig;

/// Maps wall-clock time to the trading day it belongs to.
///
/// Trading after the daily rollover counts toward the next day, and days
/// falling on a weekend roll forward to Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingCalendar {
    tz: Tz,
    rollover: NaiveTime,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::from_config(&TradingDayConfig::default())
    }
}

impl TradingCalendar {
    pub fn new(tz: Tz, rollover: NaiveTime) -> Self {
        Self { tz, rollover }
    }

    pub fn from_config(config: &TradingDayConfig) -> Self {
        let rollover = NaiveTime::from_hms_opt(config.rollover_hour, config.rollover_minute, 0)
            .unwrap_or_else(|| {
                warn!(
                    hour = config.rollover_hour,
                    minute = config.rollover_minute,
                    "invalid trading day rollover, using 15:30"
                );
                NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN)
            });
        Self::new(config.timezone, rollover)
    }

    /// Trading date for `now` (nanoseconds since the epoch).
    pub fn trading_date(&self, now: i64) -> NaiveDate {
        let local = DateTime::from_timestamp_nanos(now).with_timezone(&self.tz);
        let mut date = local.date_naive();
        if local.time() >= self.rollover {
            date = next_day(date);
        }
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date = next_day(date);
        }
        date
    }

    /// Local midnight of the trading date for `now`, in epoch nanoseconds.
    pub fn trading_day(&self, now: i64) -> i64 {
        let midnight = self.trading_date(now).and_time(NaiveTime::MIN);
        self.tz
            .from_local_datetime(&midnight)
            .earliest()
            .and_then(|dt| dt.timestamp_nanos_opt())
            .unwrap_or(0)
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}
