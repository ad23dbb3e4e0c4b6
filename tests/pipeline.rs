use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use weather_clock::app;
use weather_clock::clock::{Clock, ManualClock};
use weather_clock::config::{CityLabelMode, Config};
use weather_clock::framebuffer::{Framebuffer, FB_HEIGHT, FB_WIDTH};
use weather_clock::http_client::Transport;
use weather_clock::render::{self, LabelId, RenderDriver};
use weather_clock::state::WeatherStore;
use weather_clock::weather::{FetchError, FetchKind};
use weather_clock::weather_icons::WeatherIcon;
use weather_clock::worker::{Latch, StopSignal};

const DAILY_BODY: &str = r#"{"results":[{"location":{"name":"Foshan"},
    "daily":[{"date":"2024-05-01","text_day":"Overcast","text_night":"Cloudy",
    "high":"29","low":"22","wind_direction":"N","wind_direction_degree":"0",
    "wind_speed":"3.0","wind_scale":"1","humidity":"71"}]}]}"#;
const NOW_BODY: &str =
    r#"{"results":[{"location":{"name":"Foshan"},"now":{"text":"Overcast","temperature":"25"}}]}"#;

/// Serves a fixed body per endpoint and records every URL requested.
struct FixedTransport {
    body: &'static str,
    urls: Arc<Mutex<Vec<String>>>,
}

impl Transport for FixedTransport {
    fn get(&mut self, url: &str) -> Result<String, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.body.to_string())
    }
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn pipeline_fills_the_dashboard() {
    let cfg = Config {
        weather_api_key: "k".into(),
        location: "foshan".into(),
        city_label: CityLabelMode::Render,
        ..Config::default()
    };

    let frames = Arc::new(Mutex::new(0u32));
    let frame_counter = frames.clone();
    let driver = RenderDriver::new(
        Framebuffer::new(FB_WIDTH, FB_HEIGHT),
        Box::new(move |_fb| *frame_counter.lock().unwrap() += 1),
        &cfg.location,
    );
    let gui = render::new_gui(driver);
    render::lock_gui(&gui).set_icon(WeatherIcon::Rain);

    let stop = StopSignal::new();
    let start = Latch::new();
    let render_worker = render::spawn_render_loop(gui.clone(), start.clone(), stop.clone()).unwrap();

    let clock = Arc::new(ManualClock::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(9, 41, 0),
    ));
    let store = Arc::new(WeatherStore::new());
    let urls = Arc::new(Mutex::new(Vec::new()));
    let transport_urls = urls.clone();

    let mut workers = app::start_pipeline(
        &cfg,
        &gui,
        &store,
        clock.clone() as Arc<dyn Clock>,
        move |kind| FixedTransport {
            body: match kind {
                FetchKind::DailyForecast => DAILY_BODY,
                FetchKind::CurrentConditions => NOW_BODY,
            },
            urls: transport_urls.clone(),
        },
        &stop,
    )
    .unwrap();
    workers.push(render_worker);
    start.open();

    wait_for("labels", || {
        let g = render::lock_gui(&gui);
        g.label(LabelId::TempRange) == "22~29°C"
            && g.label(LabelId::NowTemp) == "25°C"
            && g.label(LabelId::City) == "Foshan"
            && g.label(LabelId::Date) == "2024-05-01"
            && g.icon() == WeatherIcon::Overcast
    });
    {
        let g = render::lock_gui(&gui);
        assert_eq!(g.label(LabelId::Humidity), "71%");
        assert!(["09:41", "09 41"].contains(&g.label(LabelId::Clock)));
    }
    wait_for("a flushed frame", || *frames.lock().unwrap() > 0);

    stop.stop();
    app::join_all(workers);

    let urls = urls.lock().unwrap();
    assert!(urls.iter().any(|u| u.contains("/daily.json?") && u.contains("days=1")));
    assert!(urls.iter().any(|u| u.contains("/now.json?") && u.contains("location=foshan")));
    assert_eq!(store.revision(FetchKind::CurrentConditions) as usize, urls.iter().filter(|u| u.contains("/now.json")).count());
}

#[test]
fn startup_asserts_the_initial_icon_before_any_forecast() {
    let cfg = Config::default();
    let gui = render::new_gui(RenderDriver::new(
        Framebuffer::new(FB_WIDTH, FB_HEIGHT),
        Box::new(|_| {}),
        "--",
    ));
    render::lock_gui(&gui).set_icon(WeatherIcon::Cloud);
    assert_eq!(app::STARTUP_ICON, WeatherIcon::Rain);

    let stop = StopSignal::new();
    let store = Arc::new(WeatherStore::new());
    let workers = app::start_pipeline(
        &cfg,
        &gui,
        &store,
        Arc::new(ManualClock::default()) as Arc<dyn Clock>,
        |_| FailingTransport,
        &stop,
    )
    .unwrap();

    wait_for("initial icon", || render::lock_gui(&gui).icon() == app::STARTUP_ICON);
    stop.stop();
    app::join_all(workers);

    assert_eq!(store.revision(FetchKind::DailyForecast), 0);
    assert_eq!(render::lock_gui(&gui).label(LabelId::Clock), "00:00");
}

struct FailingTransport;

impl Transport for FailingTransport {
    fn get(&mut self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::Status(503))
    }
}
