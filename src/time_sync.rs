use anyhow::Result;
use esp_idf_svc::sntp::{EspSntp, OperatingMode, SntpConf, SyncMode, SyncStatus};
use log::info;
use std::thread;
use std::time::Duration;

use crate::clock::{format_clock, format_date, Clock};

const SNTP_SERVERS: [&str; 2] = ["ntp.aliyun.com", "ntp1.aliyun.com"];
const SYNC_TIMEOUT_MS: u32 = 20_000;
const POLL_INTERVAL_MS: u32 = 250;

/// Start SNTP and wait up to 20 seconds for the first sync.
///
/// The returned EspSntp must be kept alive to maintain periodic re-sync. A
/// timeout is not an error: the clock label keeps its placeholder until the
/// background sync lands.
pub fn sync_time(clock: &dyn Clock) -> Result<EspSntp<'static>> {
    let conf = SntpConf {
        servers: SNTP_SERVERS,
        sync_mode: SyncMode::Immediate,
        operating_mode: OperatingMode::Poll,
    };

    info!("Starting SNTP sync with {}", SNTP_SERVERS.join(", "));
    let sntp = EspSntp::new_with_callback(&conf, |_| {
        info!("SNTP sync callback triggered");
    })?;

    let mut elapsed_ms = 0u32;
    while elapsed_ms < SYNC_TIMEOUT_MS {
        if sntp.get_sync_status() == SyncStatus::Completed {
            info!("SNTP time synchronized after {}ms", elapsed_ms);
            if let Some(now) = clock.now_local() {
                info!("Local time: {} {}", format_date(&now), format_clock(&now, ':'));
            }
            return Ok(sntp);
        }
        thread::sleep(Duration::from_millis(POLL_INTERVAL_MS as u64));
        elapsed_ms += POLL_INTERVAL_MS;
    }

    log::warn!(
        "SNTP sync not completed within {}s, continuing anyway (will sync in background)",
        SYNC_TIMEOUT_MS / 1000
    );
    Ok(sntp)
}
