//! Periodic UI tasks and the icon event path.

use log::{debug, info, warn};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{format_clock, format_date, Clock};
use crate::config::{CityLabelMode, UnitSystem};
use crate::render::{lock_gui, Gui, LabelId};
use crate::state::WeatherStore;
use crate::weather::{map_text_to_icon, DailyForecast, FetchKind};
use crate::weather_icons::WeatherIcon;
use crate::worker::{StopSignal, Worker};

pub const CLOCK_PERIOD: Duration = Duration::from_millis(500);
pub const DATE_PERIOD: Duration = Duration::from_millis(700);
pub const CITY_PERIOD: Duration = Duration::from_millis(1000);
pub const WATCH_PERIOD: Duration = Duration::from_millis(1000);
/// A kind counts as stale after this many missed fetch intervals.
pub const STALE_AFTER_INTERVALS: u32 = 6;
/// How often the icon task looks at the stop signal while idle.
const ICON_STOP_POLL: Duration = Duration::from_millis(500);

pub const UI_STACK_SIZE: usize = 4096;

// ── Clock ───────────────────────────────────────────────────────────

/// Two-state flip-flop driving the hour/minute separator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blink {
    on: bool,
}

impl Blink {
    pub fn new(on: bool) -> Self {
        Self { on }
    }

    /// Flip, then report the new state.
    pub fn toggle(&mut self) -> bool {
        self.on = !self.on;
        self.on
    }

    pub fn separator(self) -> char {
        if self.on {
            ':'
        } else {
            ' '
        }
    }
}

pub struct ClockTask {
    gui: Gui,
    clock: Arc<dyn Clock>,
    blink: Blink,
}

impl ClockTask {
    pub fn new(gui: Gui, clock: Arc<dyn Clock>) -> Self {
        Self {
            gui,
            clock,
            blink: Blink::default(),
        }
    }

    /// The separator flips on every call, whether or not time is known.
    pub fn tick(&mut self) {
        self.blink.toggle();
        if let Some(now) = self.clock.now_local() {
            let text = format_clock(&now, self.blink.separator());
            lock_gui(&self.gui).set_label(LabelId::Clock, &text);
        }
    }

    pub fn blink(&self) -> Blink {
        self.blink
    }

    pub fn spawn(mut self, stop: StopSignal) -> io::Result<Worker> {
        Worker::spawn_periodic("ui_clock", UI_STACK_SIZE, CLOCK_PERIOD, stop, move || {
            self.tick()
        })
    }
}

// ── Date ────────────────────────────────────────────────────────────

pub struct DateTask {
    gui: Gui,
    clock: Arc<dyn Clock>,
}

impl DateTask {
    pub fn new(gui: Gui, clock: Arc<dyn Clock>) -> Self {
        Self { gui, clock }
    }

    pub fn tick(&mut self) {
        if let Some(now) = self.clock.now_local() {
            lock_gui(&self.gui).set_label(LabelId::Date, &format_date(&now));
        }
    }

    pub fn spawn(mut self, stop: StopSignal) -> io::Result<Worker> {
        Worker::spawn_periodic("ui_date", UI_STACK_SIZE, DATE_PERIOD, stop, move || {
            self.tick()
        })
    }
}

// ── City ────────────────────────────────────────────────────────────

pub struct CityTask {
    gui: Gui,
    store: Arc<WeatherStore>,
    mode: CityLabelMode,
    ticks: u64,
}

impl CityTask {
    pub fn new(gui: Gui, store: Arc<WeatherStore>, mode: CityLabelMode) -> Self {
        Self {
            gui,
            store,
            mode,
            ticks: 0,
        }
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
        match self.mode {
            CityLabelMode::LogOnly => {
                debug!("city task tick {}", self.ticks);
            }
            CityLabelMode::Render => {
                let snap = self.store.snapshot();
                if let Some(city) = snap.city() {
                    lock_gui(&self.gui).set_label(LabelId::City, city);
                }
            }
        }
    }

    pub fn spawn(mut self, stop: StopSignal) -> io::Result<Worker> {
        Worker::spawn_periodic("ui_city", UI_STACK_SIZE, CITY_PERIOD, stop, move || {
            self.tick()
        })
    }
}

// ── Weather icon ────────────────────────────────────────────────────

/// Sending side of the icon event queue. Events carry the raw state value.
#[derive(Clone)]
pub struct IconSender {
    tx: Sender<u16>,
}

impl IconSender {
    pub fn set(&self, icon: WeatherIcon) -> bool {
        self.send_raw(icon.raw())
    }

    /// Returns false once the icon task has gone away.
    pub fn send_raw(&self, raw: u16) -> bool {
        self.tx.send(raw).is_ok()
    }
}

pub fn icon_channel() -> (IconSender, Receiver<u16>) {
    let (tx, rx) = mpsc::channel();
    (IconSender { tx }, rx)
}

pub struct WeatherIconTask {
    gui: Gui,
}

impl WeatherIconTask {
    pub fn new(gui: Gui) -> Self {
        Self { gui }
    }

    /// Apply one event. Undefined values leave the current icon in place.
    pub fn handle(&self, raw: u16) -> Option<WeatherIcon> {
        match WeatherIcon::from_raw(raw) {
            Some(icon) => {
                debug!("icon -> {}", icon.label());
                lock_gui(&self.gui).set_icon(icon);
                Some(icon)
            }
            None => {
                warn!("ignoring undefined icon state {}", raw);
                None
            }
        }
    }

    pub fn run(&self, rx: &Receiver<u16>, stop: &StopSignal) {
        while !stop.is_stopped() {
            match rx.recv_timeout(ICON_STOP_POLL) {
                Ok(raw) => {
                    self.handle(raw);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    pub fn spawn(self, rx: Receiver<u16>, stop: StopSignal) -> io::Result<Worker> {
        Worker::spawn("ui_icon", UI_STACK_SIZE, move || self.run(&rx, &stop))
    }
}

// ── Forecast watcher ────────────────────────────────────────────────

pub fn temp_range_text(daily: &DailyForecast, unit: UnitSystem) -> String {
    format!("{}~{}{}", daily.low, daily.high, unit.degree_suffix())
}

pub fn detail_text(daily: &DailyForecast) -> String {
    format!(
        "{} / {}  {} {}",
        daily.text_day, daily.text_night, daily.wind_direction, daily.wind_scale
    )
}

/// Turns committed weather into label text and icon events.
pub struct ForecastWatcher {
    gui: Gui,
    store: Arc<WeatherStore>,
    icons: IconSender,
    unit: UnitSystem,
    seen_daily: u64,
    seen_current: u64,
    stale: [bool; 2],
}

const WATCHED_KINDS: [FetchKind; 2] = [FetchKind::DailyForecast, FetchKind::CurrentConditions];

impl ForecastWatcher {
    pub fn new(gui: Gui, store: Arc<WeatherStore>, icons: IconSender, unit: UnitSystem) -> Self {
        Self {
            gui,
            store,
            icons,
            unit,
            seen_daily: 0,
            seen_current: 0,
            stale: [false; 2],
        }
    }

    /// Log each kind once when its last commit is older than
    /// [`STALE_AFTER_INTERVALS`] fetch intervals, and once more when it
    /// recovers. Returns the kinds that just went stale.
    pub fn check_staleness(&mut self, now: Instant) -> Vec<FetchKind> {
        let mut newly_stale = Vec::new();
        for (kind, stale) in WATCHED_KINDS.iter().zip(self.stale.iter_mut()) {
            let limit = kind.interval() * STALE_AFTER_INTERVALS;
            match self.store.age(*kind, now) {
                Some(age) if age > limit => {
                    if !*stale {
                        *stale = true;
                        warn!(
                            "{} data is stale: last update {}s ago",
                            kind.as_str(),
                            age.as_secs()
                        );
                        newly_stale.push(*kind);
                    }
                }
                _ => {
                    if *stale {
                        info!("{} data is fresh again", kind.as_str());
                    }
                    *stale = false;
                }
            }
        }
        newly_stale
    }

    pub fn tick(&mut self) {
        self.check_staleness(Instant::now());
        let snap = self.store.snapshot();

        if snap.daily_revision != self.seen_daily {
            self.seen_daily = snap.daily_revision;
            if let Some(daily) = snap.daily.as_deref() {
                {
                    let mut gui = lock_gui(&self.gui);
                    gui.set_label(LabelId::TempRange, &temp_range_text(daily, self.unit));
                    gui.set_label(LabelId::Humidity, &format!("{}%", daily.humidity));
                    gui.set_label(LabelId::Detail, &detail_text(daily));
                }
                match map_text_to_icon(&daily.text_day) {
                    Some(icon) => {
                        self.icons.set(icon);
                    }
                    None => info!("no icon for {:?}", daily.text_day),
                }
            }
        }

        if snap.current_revision != self.seen_current {
            self.seen_current = snap.current_revision;
            if let Some(temp) = snap.temperature() {
                let text = format!("{}{}", temp, self.unit.degree_suffix());
                lock_gui(&self.gui).set_label(LabelId::NowTemp, &text);
            }
        }
    }

    pub fn spawn(mut self, stop: StopSignal) -> io::Result<Worker> {
        Worker::spawn_periodic("ui_watch", UI_STACK_SIZE, WATCH_PERIOD, stop, move || {
            self.tick()
        })
    }
}
