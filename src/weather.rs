use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::weather_icons::WeatherIcon;

const API_BASE: &str = "https://api.seniverse.com/v3/weather";
const DAILY_INTERVAL_SECS: u64 = 10;
const NOW_INTERVAL_SECS: u64 = 5;

// ── Errors ──────────────────────────────────────────────────────────

/// Everything that can go wrong in one fetch cycle. None of these escape the
/// fetch loop; they are logged and the cycle is skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to open HTTP connection: {0}")]
    Connect(String),
    #[error("HTTP client fetch headers failed: {0}")]
    Headers(String),
    #[error("HTTP error: status {0}")]
    Status(u16),
    #[error("failed to read response: {0}")]
    Read(String),
    #[error("response too large (>{0} bytes)")]
    TooLarge(usize),
    #[error("response is not JSON")]
    NotJson,
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("empty `results` array")]
    EmptyResults,
}

// ── Fetch kinds ─────────────────────────────────────────────────────

/// The two independent queries made against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    DailyForecast,
    CurrentConditions,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::DailyForecast => "daily",
            FetchKind::CurrentConditions => "now",
        }
    }

    /// Delay between two attempts, regardless of the previous outcome.
    pub fn interval(self) -> Duration {
        match self {
            FetchKind::DailyForecast => Duration::from_secs(DAILY_INTERVAL_SECS),
            FetchKind::CurrentConditions => Duration::from_secs(NOW_INTERVAL_SECS),
        }
    }

    pub fn url(self, cfg: &Config) -> String {
        let mut url = format!(
            "{}/{}.json?key={}&location={}&language={}&unit={}",
            API_BASE,
            self.as_str(),
            encode_query_value(&cfg.weather_api_key),
            encode_query_value(&cfg.location),
            encode_query_value(&cfg.language),
            cfg.unit.as_str(),
        );
        if self == FetchKind::DailyForecast {
            url.push_str("&start=0&days=1");
        }
        url
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

// ── Data types ──────────────────────────────────────────────────────

/// `results[0].daily[0]` of the daily endpoint. Every field is kept as the
/// text the API sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyForecast {
    pub text_day: String,
    pub text_night: String,
    pub high: String,
    pub low: String,
    pub wind_direction: String,
    pub wind_direction_degree: String,
    pub wind_speed: String,
    pub wind_scale: String,
    pub humidity: String,
}

/// `results[0].location.name` and `results[0].now.temperature` of the now
/// endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentConditions {
    pub city: String,
    pub temperature: String,
}

// ── Seniverse JSON structures ───────────────────────────────────────

#[derive(Deserialize)]
struct SvRoot {
    results: Option<Vec<SvResult>>,
}

#[derive(Deserialize)]
struct SvResult {
    location: Option<SvLocation>,
    now: Option<SvNow>,
    daily: Option<Vec<SvDaily>>,
}

#[derive(Deserialize)]
struct SvLocation {
    name: Option<String>,
}

#[derive(Deserialize)]
struct SvNow {
    temperature: Option<String>,
}

#[derive(Deserialize)]
struct SvDaily {
    text_day: Option<String>,
    text_night: Option<String>,
    high: Option<String>,
    low: Option<String>,
    wind_direction: Option<String>,
    wind_direction_degree: Option<String>,
    wind_speed: Option<String>,
    wind_scale: Option<String>,
    humidity: Option<String>,
}

fn require<T>(value: Option<T>, name: &'static str) -> Result<T, FetchError> {
    value.ok_or(FetchError::MissingField(name))
}

fn first_result(json: &str) -> Result<SvResult, FetchError> {
    let root: SvRoot = serde_json::from_str(json)?;
    require(root.results, "results")?
        .into_iter()
        .next()
        .ok_or(FetchError::EmptyResults)
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse a daily endpoint body. Either all nine fields come back or an error
/// does; nothing is half-filled.
pub fn parse_daily_forecast(json: &str) -> Result<DailyForecast, FetchError> {
    let result = first_result(json)?;
    let day = require(result.daily, "results[0].daily")?
        .into_iter()
        .next()
        .ok_or(FetchError::MissingField("results[0].daily[0]"))?;

    Ok(DailyForecast {
        text_day: require(day.text_day, "text_day")?,
        text_night: require(day.text_night, "text_night")?,
        high: require(day.high, "high")?,
        low: require(day.low, "low")?,
        wind_direction: require(day.wind_direction, "wind_direction")?,
        wind_direction_degree: require(day.wind_direction_degree, "wind_direction_degree")?,
        wind_speed: require(day.wind_speed, "wind_speed")?,
        wind_scale: require(day.wind_scale, "wind_scale")?,
        humidity: require(day.humidity, "humidity")?,
    })
}

pub fn parse_current_conditions(json: &str) -> Result<CurrentConditions, FetchError> {
    let result = first_result(json)?;
    let city = require(
        require(result.location, "results[0].location")?.name,
        "location.name",
    )?;
    let temperature = require(
        require(result.now, "results[0].now")?.temperature,
        "now.temperature",
    )?;
    Ok(CurrentConditions { city, temperature })
}

// ── Icon mapping ────────────────────────────────────────────────────

/// Keywords checked in order; the first hit wins, so precipitation beats
/// cloud cover ("多云转小雨" is drawn as rain).
const ICON_KEYWORDS: [(&str, WeatherIcon); 14] = [
    ("雨", WeatherIcon::Rain),
    ("rain", WeatherIcon::Rain),
    ("shower", WeatherIcon::Rain),
    ("thunder", WeatherIcon::Rain),
    ("drizzle", WeatherIcon::Rain),
    ("阴", WeatherIcon::Overcast),
    ("overcast", WeatherIcon::Overcast),
    ("多云", WeatherIcon::Cloud),
    ("cloud", WeatherIcon::Cloud),
    ("晴", WeatherIcon::Sunny),
    ("sunny", WeatherIcon::Sunny),
    ("clear", WeatherIcon::Sunny),
    ("fair", WeatherIcon::Sunny),
    ("少云", WeatherIcon::Cloud),
];

/// Map a condition description (`text_day`) to one of the four icons.
/// Returns None for descriptions with no known keyword (snow, fog, dust…).
pub fn map_text_to_icon(text: &str) -> Option<WeatherIcon> {
    let lower = text.to_lowercase();
    ICON_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, icon)| *icon)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_OK: &str = r#"{"results":[{"location":{"name":"foshan"},
        "daily":[{"date":"2024-05-01","text_day":"多云","code_day":"4",
        "text_night":"小雨","high":"30","low":"23","wind_direction":"东南",
        "wind_direction_degree":"135","wind_speed":"8.4","wind_scale":"2",
        "humidity":"85"}],"last_update":"2024-05-01T08:00:00+08:00"}]}"#;

    #[test]
    fn daily_payload_fills_all_nine_fields() {
        let d = parse_daily_forecast(DAILY_OK).unwrap();
        assert_eq!(
            d,
            DailyForecast {
                text_day: "多云".into(),
                text_night: "小雨".into(),
                high: "30".into(),
                low: "23".into(),
                wind_direction: "东南".into(),
                wind_direction_degree: "135".into(),
                wind_speed: "8.4".into(),
                wind_scale: "2".into(),
                humidity: "85".into(),
            }
        );
    }

    #[test]
    fn daily_payload_missing_any_key_is_rejected() {
        let keys = [
            "text_day",
            "text_night",
            "high",
            "low",
            "wind_direction",
            "wind_direction_degree",
            "wind_speed",
            "wind_scale",
            "humidity",
        ];
        for key in keys {
            let needle = format!("\"{}\":", key);
            let renamed = format!("\"x_{}\":", key);
            let broken = DAILY_OK.replacen(&needle, &renamed, 1);
            match parse_daily_forecast(&broken) {
                Err(FetchError::MissingField(name)) => assert_eq!(name, key),
                other => panic!("{key}: expected MissingField, got {other:?}"),
            }
        }
    }

    #[test]
    fn daily_payload_without_days_is_rejected() {
        let err = parse_daily_forecast(r#"{"results":[{"daily":[]}]}"#).unwrap_err();
        assert!(matches!(err, FetchError::MissingField("results[0].daily[0]")));
        let err = parse_daily_forecast(r#"{"results":[{"now":{}}]}"#).unwrap_err();
        assert!(matches!(err, FetchError::MissingField("results[0].daily")));
    }

    #[test]
    fn current_payload_extracts_city_and_temperature() {
        let c = parse_current_conditions(
            r#"{"results":[{"location":{"name":"foshan"},"now":{"temperature":"23"}}]}"#,
        )
        .unwrap();
        assert_eq!(c.city, "foshan");
        assert_eq!(c.temperature, "23");
    }

    #[test]
    fn empty_results_is_a_failure() {
        assert!(matches!(
            parse_current_conditions(r#"{"results":[]}"#),
            Err(FetchError::EmptyResults)
        ));
        assert!(matches!(
            parse_daily_forecast(r#"{"results":[]}"#),
            Err(FetchError::EmptyResults)
        ));
    }

    #[test]
    fn api_error_body_has_no_results() {
        let body = r#"{"status":"The API key is invalid.","status_code":"AP010003"}"#;
        assert!(matches!(
            parse_current_conditions(body),
            Err(FetchError::MissingField("results"))
        ));
    }

    #[test]
    fn wrong_value_types_surface_as_json_errors() {
        let body = r#"{"results":[{"location":{"name":"foshan"},"now":{"temperature":23}}]}"#;
        assert!(matches!(parse_current_conditions(body), Err(FetchError::Json(_))));
        assert!(matches!(parse_current_conditions("not json"), Err(FetchError::Json(_))));
    }

    #[test]
    fn urls_carry_location_language_and_unit() {
        let cfg = Config {
            weather_api_key: "KEY".into(),
            location: "foshan".into(),
            language: "zh-Hans".into(),
            ..Config::default()
        };
        assert_eq!(
            FetchKind::DailyForecast.url(&cfg),
            "https://api.seniverse.com/v3/weather/daily.json?key=KEY&location=foshan\
             &language=zh-Hans&unit=c&start=0&days=1"
        );
        assert_eq!(
            FetchKind::CurrentConditions.url(&cfg),
            "https://api.seniverse.com/v3/weather/now.json?key=KEY&location=foshan\
             &language=zh-Hans&unit=c"
        );
    }

    #[test]
    fn query_values_are_percent_encoded() {
        assert_eq!(encode_query_value("佛山"), "%E4%BD%9B%E5%B1%B1");
        assert_eq!(encode_query_value("22.5:113.1"), "22.5%3A113.1");
        assert_eq!(encode_query_value("new york"), "new%20york");
    }

    #[test]
    fn fetch_kinds_poll_at_their_own_rate() {
        assert_eq!(FetchKind::DailyForecast.interval(), Duration::from_secs(10));
        assert_eq!(FetchKind::CurrentConditions.interval(), Duration::from_secs(5));
    }

    #[test]
    fn condition_text_maps_to_icons() {
        assert_eq!(map_text_to_icon("晴"), Some(WeatherIcon::Sunny));
        assert_eq!(map_text_to_icon("多云"), Some(WeatherIcon::Cloud));
        assert_eq!(map_text_to_icon("阴"), Some(WeatherIcon::Overcast));
        assert_eq!(map_text_to_icon("雷阵雨"), Some(WeatherIcon::Rain));
        assert_eq!(map_text_to_icon("多云转小雨"), Some(WeatherIcon::Rain));
        assert_eq!(map_text_to_icon("Partly Cloudy"), Some(WeatherIcon::Cloud));
        assert_eq!(map_text_to_icon("Clear"), Some(WeatherIcon::Sunny));
        assert_eq!(map_text_to_icon("Overcast"), Some(WeatherIcon::Overcast));
        assert_eq!(map_text_to_icon("Light Rain"), Some(WeatherIcon::Rain));
        assert_eq!(map_text_to_icon("大雪"), None);
        assert_eq!(map_text_to_icon(""), None);
    }
}
