use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use std::sync::{Mutex, PoisonError};

/// Anything before 2001-09-09 means SNTP has not set the RTC yet.
const MIN_VALID_EPOCH: i64 = 1_000_000_000;

/// Source of wall-clock time for the UI tasks.
pub trait Clock: Send + Sync {
    /// Local time, or None while the system clock is still unset.
    fn now_local(&self) -> Option<NaiveDateTime>;
}

/// System time shifted by a fixed UTC offset.
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Offsets outside ±24h fall back to UTC.
    pub fn new(utc_offset_secs: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| {
            log::warn!("invalid UTC offset {}s, using UTC", utc_offset_secs);
            Utc.fix()
        });
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now_local(&self) -> Option<NaiveDateTime> {
        let now = Utc::now();
        if now.timestamp() < MIN_VALID_EPOCH {
            return None;
        }
        Some(now.with_timezone(&self.offset).naive_local())
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Option<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(now: Option<NaiveDateTime>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Option<NaiveDateTime>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for ManualClock {
    fn now_local(&self) -> Option<NaiveDateTime> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `HH:MM` with `sep` between hours and minutes.
pub fn format_clock(now: &NaiveDateTime, sep: char) -> String {
    format!("{}{}{}", now.format("%H"), sep, now.format("%M"))
}

pub fn format_date(now: &NaiveDateTime) -> String {
    now.format("%Y-%m-%d").to_string()
}
