//! Latest committed weather data, published as immutable snapshots.
//!
//! Each fetch kind owns one slot. A commit swaps in a fully built `Arc`
//! under a short lock, so a reader either sees the whole previous value of a
//! kind or the whole new one. The two kinds never touch each other's slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::weather::{CurrentConditions, DailyForecast, FetchKind};

struct Slot<T> {
    value: Option<Arc<T>>,
    revision: u64,
    committed_at: Option<Instant>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            revision: 0,
            committed_at: None,
        }
    }
}

impl<T> Slot<T> {
    fn publish(&mut self, value: T) -> u64 {
        self.value = Some(Arc::new(value));
        self.revision += 1;
        self.committed_at = Some(Instant::now());
        self.revision
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A slot is only ever replaced wholesale, so a poisoned guard still holds
    // a consistent value.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consistent view of both fetch kinds at one instant.
#[derive(Debug, Clone, Default)]
pub struct WeatherSnapshot {
    pub daily: Option<Arc<DailyForecast>>,
    pub current: Option<Arc<CurrentConditions>>,
    pub daily_revision: u64,
    pub current_revision: u64,
}

impl WeatherSnapshot {
    pub fn city(&self) -> Option<&str> {
        self.current.as_deref().map(|c| c.city.as_str())
    }

    pub fn temperature(&self) -> Option<&str> {
        self.current.as_deref().map(|c| c.temperature.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_none() && self.current.is_none()
    }
}

#[derive(Default)]
pub struct WeatherStore {
    daily: Mutex<Slot<DailyForecast>>,
    current: Mutex<Slot<CurrentConditions>>,
}

impl WeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all nine forecast fields. Returns the new revision.
    pub fn commit_daily(&self, daily: DailyForecast) -> u64 {
        lock(&self.daily).publish(daily)
    }

    /// Replace city and temperature. Returns the new revision.
    pub fn commit_current(&self, current: CurrentConditions) -> u64 {
        lock(&self.current).publish(current)
    }

    pub fn snapshot(&self) -> WeatherSnapshot {
        let (daily, daily_revision) = {
            let slot = lock(&self.daily);
            (slot.value.clone(), slot.revision)
        };
        let (current, current_revision) = {
            let slot = lock(&self.current);
            (slot.value.clone(), slot.revision)
        };
        WeatherSnapshot {
            daily,
            current,
            daily_revision,
            current_revision,
        }
    }

    /// Number of successful commits of `kind` so far.
    pub fn revision(&self, kind: FetchKind) -> u64 {
        match kind {
            FetchKind::DailyForecast => lock(&self.daily).revision,
            FetchKind::CurrentConditions => lock(&self.current).revision,
        }
    }

    pub fn last_success(&self, kind: FetchKind) -> Option<Instant> {
        match kind {
            FetchKind::DailyForecast => lock(&self.daily).committed_at,
            FetchKind::CurrentConditions => lock(&self.current).committed_at,
        }
    }

    /// Time since the last commit of `kind` as seen at `now`; None before the
    /// first commit.
    pub fn age(&self, kind: FetchKind, now: Instant) -> Option<Duration> {
        self.last_success(kind)
            .map(|at| now.saturating_duration_since(at))
    }
}
