#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    device::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("weather-clock is ESP-IDF firmware; build it for an espidf target.");
    std::process::exit(1);
}

#[cfg(target_os = "espidf")]
mod device {
    use anyhow::Result;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
    use log::{info, warn};
    use std::sync::Arc;
    use std::time::Duration;

    use weather_clock::app;
    use weather_clock::clock::{Clock, SystemClock};
    use weather_clock::config::{self, Config};
    use weather_clock::framebuffer::{Framebuffer, FB_HEIGHT, FB_WIDTH};
    use weather_clock::http_client::EspHttpsTransport;
    use weather_clock::panel::{self, Panel};
    use weather_clock::render::{self, LabelId, RenderDriver};
    use weather_clock::state::WeatherStore;
    use weather_clock::time_sync;
    use weather_clock::wifi;
    use weather_clock::worker::{Latch, StopSignal};

    const IP_WAIT_LOG_EVERY: Duration = Duration::from_secs(30);

    pub fn run() -> Result<()> {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        info!("BOOT: weather-clock v{}", env!("CARGO_PKG_VERSION"));

        // ── 1. Peripherals + NVS config ──
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;

        let mut nvs = EspNvs::new(nvs_partition, config::NS, true)?;
        if let Err(e) = Config::provision(&mut nvs, &Config::default()) {
            warn!("NVS provisioning failed: {}", e);
        }
        let cfg = Config::load(&nvs);

        // ── 2. Display + render loop (held until the pipeline is up) ──
        let panel = Panel::init()?;
        let driver = RenderDriver::new(
            Framebuffer::new(FB_WIDTH, FB_HEIGHT),
            panel.into_flush(),
            &cfg.location,
        );
        let gui = render::new_gui(driver);
        {
            let mut g = render::lock_gui(&gui);
            g.set_label(LabelId::Detail, "Connecting to Wi-Fi...");
            g.tick();
        }
        panel::enable_backlight();

        let stop = StopSignal::new();
        let start = Latch::new();
        let render_worker = render::spawn_render_loop(gui.clone(), start.clone(), stop.clone())?;

        // ── 3. Wi-Fi, then wait for the first address ──
        let ip_ready = Latch::new();
        let link = wifi::start(
            peripherals.modem,
            sysloop,
            &cfg.wifi_ssid,
            &cfg.wifi_pass,
            ip_ready.clone(),
        )?;
        while !ip_ready.wait_timeout(IP_WAIT_LOG_EVERY) {
            info!("still waiting for an IP address ({} disconnects so far)", link.disconnects());
        }

        {
            let mut g = render::lock_gui(&gui);
            g.set_label(LabelId::Detail, "Syncing time...");
            g.tick();
        }

        // ── 4. Time ──
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(cfg.utc_offset_secs));
        let _sntp = time_sync::sync_time(clock.as_ref())?;

        // ── 5. Workers ──
        render::lock_gui(&gui).set_label(LabelId::Detail, "");
        let store = Arc::new(WeatherStore::new());
        let mut workers = app::start_pipeline(
            &cfg,
            &gui,
            &store,
            clock,
            |_| EspHttpsTransport::new(),
            &stop,
        )?;
        workers.push(render_worker);

        start.open();
        info!("startup complete, {} workers running", workers.len());

        app::join_all(workers);
        Ok(())
    }
}
