//! Fetch loops for the two endpoints.
//!
//! A failed cycle never touches the store: the previous values stay on
//! screen and the next attempt happens after the normal interval.

use log::{debug, info, warn};
use std::io;
use std::sync::Arc;

use crate::http_client::Transport;
use crate::state::WeatherStore;
use crate::weather::{self, FetchError, FetchKind};
use crate::worker::{StopSignal, Worker};

/// Log the first failure and every Nth consecutive one at warn level.
const FAILURE_WARN_EVERY: u32 = 10;

pub const WEATHER_STACK_SIZE: usize = 16384;

/// GET the daily endpoint and commit all nine fields on success.
pub fn fetch_daily_forecast<T: Transport>(
    transport: &mut T,
    url: &str,
    store: &WeatherStore,
) -> Result<u64, FetchError> {
    let body = transport.get(url)?;
    let daily = weather::parse_daily_forecast(&body)?;
    debug!(
        "daily: {} / {} {}~{} humidity {}",
        daily.text_day, daily.text_night, daily.low, daily.high, daily.humidity
    );
    Ok(store.commit_daily(daily))
}

/// GET the now endpoint and commit city and temperature on success.
pub fn fetch_current_conditions<T: Transport>(
    transport: &mut T,
    url: &str,
    store: &WeatherStore,
) -> Result<u64, FetchError> {
    let body = transport.get(url)?;
    let current = weather::parse_current_conditions(&body)?;
    debug!("now: {} {}", current.city, current.temperature);
    Ok(store.commit_current(current))
}

/// One periodic fetcher bound to a single endpoint.
pub struct WeatherClient<T> {
    kind: FetchKind,
    url: String,
    transport: T,
    store: Arc<WeatherStore>,
    consecutive_failures: u32,
    successes: u64,
}

impl<T: Transport> WeatherClient<T> {
    pub fn new(kind: FetchKind, url: String, transport: T, store: Arc<WeatherStore>) -> Self {
        Self {
            kind,
            url,
            transport,
            store,
            consecutive_failures: 0,
            successes: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Run a single request/parse/commit cycle and account for its outcome.
    pub fn fetch_once(&mut self) -> Result<u64, FetchError> {
        let result = match self.kind {
            FetchKind::DailyForecast => {
                fetch_daily_forecast(&mut self.transport, &self.url, &self.store)
            }
            FetchKind::CurrentConditions => {
                fetch_current_conditions(&mut self.transport, &self.url, &self.store)
            }
        };
        self.record(&result);
        result
    }

    fn record(&mut self, result: &Result<u64, FetchError>) {
        match result {
            Ok(revision) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "{} fetch recovered after {} failures",
                        self.kind.as_str(),
                        self.consecutive_failures
                    );
                } else if self.successes == 0 {
                    info!("{} fetch ok (revision {})", self.kind.as_str(), revision);
                }
                self.consecutive_failures = 0;
                self.successes += 1;
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures == 1
                    || self.consecutive_failures % FAILURE_WARN_EVERY == 0
                {
                    warn!(
                        "{} fetch failed ({} consecutive): {}",
                        self.kind.as_str(),
                        self.consecutive_failures,
                        e
                    );
                } else {
                    info!(
                        "{} fetch failed ({} consecutive)",
                        self.kind.as_str(),
                        self.consecutive_failures
                    );
                }
            }
        }
    }

    /// Fetch, then wait one interval, until `stop` fires.
    pub fn run(&mut self, stop: &StopSignal) {
        info!(
            "{} fetcher started, every {:?}",
            self.kind.as_str(),
            self.kind.interval()
        );
        while !stop.is_stopped() {
            let _ = self.fetch_once();
            if !stop.sleep(self.kind.interval()) {
                break;
            }
        }
        info!("{} fetcher stopped", self.kind.as_str());
    }
}

impl<T: Transport + Send + 'static> WeatherClient<T> {
    pub fn spawn(mut self, stop: StopSignal) -> io::Result<Worker> {
        let name = format!("wx_{}", self.kind.as_str());
        Worker::spawn(&name, WEATHER_STACK_SIZE, move || self.run(&stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const DAILY_BODY: &str = r#"{"results":[{"location":{"name":"Foshan"},
        "daily":[{"date":"2024-05-01","text_day":"Cloudy","text_night":"Light rain",
        "high":"30","low":"24","wind_direction":"SE","wind_direction_degree":"135",
        "wind_speed":"8.4","wind_scale":"2","humidity":"83"}]}]}"#;
    const NOW_BODY: &str =
        r#"{"results":[{"location":{"name":"Foshan"},"now":{"text":"Cloudy","temperature":"27"}}]}"#;

    struct Scripted {
        replies: VecDeque<Result<String, FetchError>>,
        urls: Vec<String>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, FetchError>>) -> Self {
            Self {
                replies: replies.into(),
                urls: Vec::new(),
            }
        }
    }

    impl Transport for Scripted {
        fn get(&mut self, url: &str) -> Result<String, FetchError> {
            self.urls.push(url.to_string());
            self.replies
                .pop_front()
                .unwrap_or(Err(FetchError::Connect("script exhausted".into())))
        }
    }

    #[test]
    fn daily_success_commits_every_field() {
        let store = WeatherStore::new();
        let mut t = Scripted::new(vec![Ok(DAILY_BODY.into())]);
        assert_eq!(fetch_daily_forecast(&mut t, "u", &store).unwrap(), 1);
        let snap = store.snapshot();
        let d = snap.daily.unwrap();
        assert_eq!(d.text_day, "Cloudy");
        assert_eq!(d.wind_speed, "8.4");
        assert_eq!(d.humidity, "83");
        assert!(snap.current.is_none());
    }

    #[test]
    fn failures_leave_the_store_untouched() {
        let store = WeatherStore::new();
        let mut t = Scripted::new(vec![
            Ok(NOW_BODY.into()),
            Err(FetchError::Status(500)),
            Ok(r#"{"status":"The API key is invalid.","status_code":"AP010003"}"#.into()),
            Ok(r#"{"results":[{"location":{"name":"X"}}]}"#.into()),
            Ok(r#"{"results":[]}"#.into()),
        ]);
        fetch_current_conditions(&mut t, "u", &store).unwrap();
        assert!(matches!(
            fetch_current_conditions(&mut t, "u", &store),
            Err(FetchError::Status(500))
        ));
        assert!(fetch_current_conditions(&mut t, "u", &store).is_err());
        assert!(matches!(
            fetch_current_conditions(&mut t, "u", &store),
            Err(FetchError::MissingField(_))
        ));
        assert!(matches!(
            fetch_current_conditions(&mut t, "u", &store),
            Err(FetchError::EmptyResults)
        ));
        let snap = store.snapshot();
        assert_eq!(snap.city(), Some("Foshan"));
        assert_eq!(snap.temperature(), Some("27"));
        assert_eq!(snap.current_revision, 1);
    }

    #[test]
    fn client_counts_failures_and_resets_on_success() {
        let store = Arc::new(WeatherStore::new());
        let t = Scripted::new(vec![
            Err(FetchError::Connect("down".into())),
            Err(FetchError::NotJson),
            Ok(DAILY_BODY.into()),
        ]);
        let mut client =
            WeatherClient::new(FetchKind::DailyForecast, "https://x/daily".into(), t, store.clone());
        assert!(client.fetch_once().is_err());
        assert!(client.fetch_once().is_err());
        assert_eq!(client.consecutive_failures(), 2);
        assert_eq!(client.fetch_once().unwrap(), 1);
        assert_eq!(client.consecutive_failures(), 0);
        assert_eq!(client.successes(), 1);
        assert_eq!(client.transport.urls, vec!["https://x/daily"; 3]);
        assert_eq!(store.revision(FetchKind::DailyForecast), 1);
    }

    #[test]
    fn run_exits_promptly_when_stopped() {
        let store = Arc::new(WeatherStore::new());
        let t = Scripted::new(vec![Ok(NOW_BODY.into())]);
        let client = WeatherClient::new(FetchKind::CurrentConditions, "u".into(), t, store.clone());
        let stop = StopSignal::new();
        let worker = client.spawn(stop.clone()).unwrap();
        assert_eq!(worker.name(), "wx_now");
        while store.revision(FetchKind::CurrentConditions) == 0 {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        stop.stop();
        worker.join().unwrap();
        assert_eq!(store.snapshot().city(), Some("Foshan"));
    }
}
