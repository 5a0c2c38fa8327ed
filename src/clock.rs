use chrono::{FixedOffset, NaiveDate, Offset, Utc};

/// Source of "today" for the lifecycle sweep and `/config`.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Wall clock read at a fixed offset from UTC (IST, +05:30, by default).
#[derive(Debug, Clone, Copy)]
pub struct OffsetClock {
    offset: FixedOffset,
}

impl OffsetClock {
    pub const DEFAULT_OFFSET_MINUTES: i32 = 5 * 60 + 30;

    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes * 60).map(|offset| Self { offset })
    }
}

impl Default for OffsetClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(Self::DEFAULT_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl Clock for OffsetClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Pinned date, used for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedClock {
    date: NaiveDate,
}

impl SimulatedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl Clock for SimulatedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
