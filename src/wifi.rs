//! Station-mode Wi-Fi driven by system events.
//!
//! The driver is started once. Association, reconnection after a drop and
//! IP acquisition all happen in event callbacks; the rest of the firmware
//! only waits on the [`Latch`] that opens with the first address.

use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
use log::{info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::worker::Latch;

/// Log association state straight from the driver.
fn log_wifi_diag(label: &str) {
    unsafe {
        let mut ap_info: esp_idf_sys::wifi_ap_record_t = core::mem::zeroed();
        let rc = esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info);
        if rc == esp_idf_sys::ESP_OK {
            let ssid = core::str::from_utf8(&ap_info.ssid)
                .unwrap_or("?")
                .trim_end_matches('\0');
            info!(
                "WiFi [{}]: assoc=YES rssi={} ch={} ssid={}",
                label, ap_info.rssi, ap_info.primary, ssid
            );
        } else {
            info!("WiFi [{}]: assoc=NO (ap_info err={})", label, rc);
        }
    }
}

fn request_connect(reason: &str) {
    let rc = unsafe { esp_idf_sys::esp_wifi_connect() };
    if rc == esp_idf_sys::ESP_OK {
        info!("WiFi connect requested ({})", reason);
    } else {
        warn!("esp_wifi_connect failed ({}): err {}", reason, rc);
    }
}

/// Owns the driver and the event subscriptions. Dropping it tears both down.
pub struct WifiLink {
    _wifi: Box<EspWifi<'static>>,
    _wifi_events: EspSubscription<'static, System>,
    _ip_events: EspSubscription<'static, System>,
    disconnects: Arc<AtomicU32>,
}

impl WifiLink {
    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::Relaxed)
    }
}

/// Configure the station, hook the event handlers and start the driver.
/// `ip_ready` opens when DHCP hands out the first address; later
/// re-acquisitions only log.
pub fn start(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    ssid: &str,
    password: &str,
    ip_ready: Latch,
) -> Result<WifiLink> {
    let mut wifi = Box::new(EspWifi::new(modem, sysloop.clone(), None)?);

    let auth = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let mut wifi_ssid = heapless::String::<32>::new();
    let mut wifi_pass = heapless::String::<64>::new();
    if wifi_ssid.push_str(ssid).is_err() {
        warn!("WiFi SSID longer than 32 bytes, ignored");
    }
    if wifi_pass.push_str(password).is_err() {
        warn!("WiFi password longer than 64 bytes, ignored");
    }

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: wifi_ssid,
        password: wifi_pass,
        auth_method: auth,
        ..Default::default()
    }))?;

    let disconnects = Arc::new(AtomicU32::new(0));
    let counter = disconnects.clone();
    let wifi_events = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
        WifiEvent::StaStarted => request_connect("sta started"),
        WifiEvent::StaDisconnected(_) => {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            log_wifi_diag("disconnected");
            request_connect(&format!("disconnect #{}", n));
        }
        WifiEvent::StaConnected(_) => log_wifi_diag("connected"),
        _ => {}
    })?;

    let ip_events = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(assignment) = event {
            if ip_ready.is_open() {
                info!("WiFi got IP again: {}", assignment.ip());
            } else {
                info!("WiFi connected, IP: {}", assignment.ip());
                ip_ready.open();
            }
        }
    })?;

    wifi.start()?;
    info!("WiFi started, connecting to '{}'", ssid);

    Ok(WifiLink {
        _wifi: wifi,
        _wifi_events: wifi_events,
        _ip_events: ip_events,
        disconnects,
    })
}
