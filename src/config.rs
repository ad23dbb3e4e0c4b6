use log::info;

#[cfg(target_os = "espidf")]
use anyhow::Result;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspNvs, NvsDefault};

pub const NS: &str = "wx_cfg";

#[cfg(target_os = "espidf")]
const KEY_WIFI_SSID: &str = "wifi_ssid";
#[cfg(target_os = "espidf")]
const KEY_WIFI_PASS: &str = "wifi_pass";
#[cfg(target_os = "espidf")]
const KEY_WX_API_KEY: &str = "wx_api_key";
#[cfg(target_os = "espidf")]
const KEY_LOCATION: &str = "wx_location";
#[cfg(target_os = "espidf")]
const KEY_LANGUAGE: &str = "wx_lang";
#[cfg(target_os = "espidf")]
const KEY_UNIT: &str = "wx_unit";
#[cfg(target_os = "espidf")]
const KEY_UTC_OFFSET: &str = "utc_offset";
#[cfg(target_os = "espidf")]
const KEY_CITY_LABEL: &str = "city_label";

const DEFAULT_WIFI_SSID: &str = match option_env!("LOCAL_WIFI_SSID") {
    Some(v) => v,
    None => "",
};
const DEFAULT_WIFI_PASS: &str = match option_env!("LOCAL_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const DEFAULT_WX_API_KEY: &str = match option_env!("LOCAL_WEATHER_API_KEY") {
    Some(v) => v,
    None => "",
};
const DEFAULT_LOCATION: &str = match option_env!("LOCAL_WEATHER_LOCATION") {
    Some(v) => v,
    None => "foshan",
};
/// The panel fonts are Latin-only, so ask the API for English text.
const DEFAULT_LANGUAGE: &str = "en";
/// China Standard Time, the zone the dashboard was built for.
const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Celsius,
    Fahrenheit,
}

impl UnitSystem {
    /// Value of the API's `unit` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            UnitSystem::Celsius => "c",
            UnitSystem::Fahrenheit => "f",
        }
    }

    pub fn degree_suffix(self) -> &'static str {
        match self {
            UnitSystem::Celsius => "°C",
            UnitSystem::Fahrenheit => "°F",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Some(UnitSystem::Celsius),
            "f" | "fahrenheit" => Some(UnitSystem::Fahrenheit),
            _ => None,
        }
    }
}

/// What the city task does on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CityLabelMode {
    /// Log a heartbeat and leave the label as drawn at start-up.
    #[default]
    LogOnly,
    /// Redraw the label from the latest current-conditions snapshot.
    Render,
}

impl CityLabelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CityLabelMode::LogOnly => "log",
            CityLabelMode::Render => "render",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Some(CityLabelMode::LogOnly),
            "render" => Some(CityLabelMode::Render),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub weather_api_key: String,
    pub location: String,
    pub language: String,
    pub unit: UnitSystem,
    pub utc_offset_secs: i32,
    pub city_label: CityLabelMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi_ssid: DEFAULT_WIFI_SSID.to_string(),
            wifi_pass: DEFAULT_WIFI_PASS.to_string(),
            weather_api_key: DEFAULT_WX_API_KEY.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            unit: UnitSystem::default(),
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            city_label: CityLabelMode::default(),
        }
    }
}

impl Config {
    pub fn log_summary(&self) {
        info!("config wifi_ssid = {:?}", self.wifi_ssid);
        info!("config wifi_pass = <{} chars>", self.wifi_pass.len());
        info!("config wx_api_key = <{} chars>", self.weather_api_key.len());
        info!(
            "config location = {:?} language = {:?} unit = {}",
            self.location,
            self.language,
            self.unit.as_str()
        );
        info!(
            "config utc_offset = {}s city_label = {}",
            self.utc_offset_secs,
            self.city_label.as_str()
        );
    }
}

/// Read a string from NVS, returning None if the key is absent or on error.
#[cfg(target_os = "espidf")]
fn nvs_get_str(nvs: &EspNvs<NvsDefault>, key: &str) -> Option<String> {
    let len = match nvs.str_len(key) {
        Ok(Some(len)) => len,
        _ => return None,
    };

    let mut buf = vec![0u8; len];
    match nvs.get_str(key, &mut buf) {
        Ok(Some(val)) => {
            let s = val.trim_end_matches('\0').to_string();
            if s.is_empty() { None } else { Some(s) }
        }
        _ => None,
    }
}

#[cfg(target_os = "espidf")]
impl Config {
    /// Load configuration from NVS, falling back to the compiled-in defaults
    /// for any missing keys.
    pub fn load(nvs: &EspNvs<NvsDefault>) -> Config {
        let defaults = Config::default();

        let utc_offset_secs = nvs
            .get_i32(KEY_UTC_OFFSET)
            .unwrap_or(None)
            .unwrap_or(defaults.utc_offset_secs);

        let cfg = Config {
            wifi_ssid: nvs_get_str(nvs, KEY_WIFI_SSID).unwrap_or(defaults.wifi_ssid),
            wifi_pass: nvs_get_str(nvs, KEY_WIFI_PASS).unwrap_or(defaults.wifi_pass),
            weather_api_key: nvs_get_str(nvs, KEY_WX_API_KEY)
                .unwrap_or(defaults.weather_api_key),
            location: nvs_get_str(nvs, KEY_LOCATION).unwrap_or(defaults.location),
            language: nvs_get_str(nvs, KEY_LANGUAGE).unwrap_or(defaults.language),
            unit: nvs_get_str(nvs, KEY_UNIT)
                .as_deref()
                .and_then(UnitSystem::parse)
                .unwrap_or(defaults.unit),
            utc_offset_secs,
            city_label: nvs_get_str(nvs, KEY_CITY_LABEL)
                .as_deref()
                .and_then(CityLabelMode::parse)
                .unwrap_or(defaults.city_label),
        };
        cfg.log_summary();
        cfg
    }

    pub fn save_wifi(nvs: &mut EspNvs<NvsDefault>, ssid: &str, pass: &str) -> Result<()> {
        nvs.set_str(KEY_WIFI_SSID, ssid)?;
        nvs.set_str(KEY_WIFI_PASS, pass)?;
        info!("NVS saved wifi_ssid={:?}", ssid);
        Ok(())
    }

    pub fn save_weather_api_key(nvs: &mut EspNvs<NvsDefault>, key: &str) -> Result<()> {
        nvs.set_str(KEY_WX_API_KEY, key)?;
        info!("NVS saved wx_api_key=<{} chars>", key.len());
        Ok(())
    }

    pub fn save_location(nvs: &mut EspNvs<NvsDefault>, location: &str) -> Result<()> {
        nvs.set_str(KEY_LOCATION, location)?;
        info!("NVS saved wx_location={:?}", location);
        Ok(())
    }

    /// Copy compiled-in Wi-Fi, API key and location values into NVS when the
    /// namespace has none yet, so a later image built without
    /// `wifi.local.rs` keeps working.
    pub fn provision(nvs: &mut EspNvs<NvsDefault>, cfg: &Config) -> Result<()> {
        if nvs_get_str(nvs, KEY_WIFI_SSID).is_none() && !cfg.wifi_ssid.is_empty() {
            Config::save_wifi(nvs, &cfg.wifi_ssid, &cfg.wifi_pass)?;
        }
        if nvs_get_str(nvs, KEY_WX_API_KEY).is_none() && !cfg.weather_api_key.is_empty() {
            Config::save_weather_api_key(nvs, &cfg.weather_api_key)?;
        }
        if nvs_get_str(nvs, KEY_LOCATION).is_none() {
            Config::save_location(nvs, &cfg.location)?;
        }
        Ok(())
    }
}
