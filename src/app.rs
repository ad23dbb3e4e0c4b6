//! Wiring of the worker set that runs once the network is up.

use log::{error, info};
use std::io;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::http_client::Transport;
use crate::render::Gui;
use crate::state::WeatherStore;
use crate::ui::{icon_channel, CityTask, ClockTask, DateTask, ForecastWatcher, WeatherIconTask};
use crate::weather::FetchKind;
use crate::weather_client::WeatherClient;
use crate::weather_icons::WeatherIcon;
use crate::worker::{StopSignal, Worker};

/// Icon state asserted once when the pipeline starts, before any forecast
/// has arrived.
pub const STARTUP_ICON: WeatherIcon = WeatherIcon::Rain;

/// Spawn both fetchers, the icon task, the clock/date/city tasks and the
/// forecast watcher. `make_transport` is called once per fetch kind so each
/// fetcher owns its own connection.
pub fn start_pipeline<T, F>(
    cfg: &Config,
    gui: &Gui,
    store: &Arc<WeatherStore>,
    clock: Arc<dyn Clock>,
    mut make_transport: F,
    stop: &StopSignal,
) -> io::Result<Vec<Worker>>
where
    T: Transport + Send + 'static,
    F: FnMut(FetchKind) -> T,
{
    let mut workers = Vec::new();

    for kind in [FetchKind::DailyForecast, FetchKind::CurrentConditions] {
        let client = WeatherClient::new(kind, kind.url(cfg), make_transport(kind), store.clone());
        workers.push(client.spawn(stop.clone())?);
    }

    let (icons, icon_rx) = icon_channel();
    workers.push(WeatherIconTask::new(gui.clone()).spawn(icon_rx, stop.clone())?);
    icons.set(STARTUP_ICON);

    workers.push(ClockTask::new(gui.clone(), clock.clone()).spawn(stop.clone())?);
    workers.push(DateTask::new(gui.clone(), clock).spawn(stop.clone())?);
    workers.push(CityTask::new(gui.clone(), store.clone(), cfg.city_label).spawn(stop.clone())?);
    workers.push(ForecastWatcher::new(gui.clone(), store.clone(), icons, cfg.unit).spawn(stop.clone())?);

    info!(
        "pipeline started: {}",
        workers.iter().map(Worker::name).collect::<Vec<_>>().join(", ")
    );
    Ok(workers)
}

/// Wait for every worker; a panicked worker is reported and skipped.
pub fn join_all(workers: Vec<Worker>) {
    for worker in workers {
        let name = worker.name().to_string();
        if worker.join().is_err() {
            error!("worker {} panicked", name);
        }
    }
}
