pub mod app;
pub mod clock;
pub mod config;
pub mod framebuffer;
pub mod http_client;
pub mod layout;
pub mod render;
pub mod state;
pub mod ui;
pub mod weather;
pub mod weather_client;
pub mod weather_icons;
pub mod worker;

#[cfg(target_os = "espidf")]
pub mod panel;
#[cfg(target_os = "espidf")]
pub mod time_sync;
#[cfg(target_os = "espidf")]
pub mod wifi;
