use crate::weather::FetchError;

/// Upper bound on a response body; the API answers well under 4 KiB.
pub const MAX_BODY_BYTES: usize = 32 * 1024;

/// Blocking HTTP GET. Implementations own their connection state and are
/// only ever used from the thread that owns them.
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<String, FetchError>;
}

pub fn check_status(status: u16) -> Result<(), FetchError> {
    if status == 200 {
        Ok(())
    } else {
        Err(FetchError::Status(status))
    }
}

/// Turn a raw body into text that at least looks like a JSON object.
pub fn body_to_json_text(body: Vec<u8>) -> Result<String, FetchError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(FetchError::TooLarge(MAX_BODY_BYTES));
    }
    let text = String::from_utf8(body).map_err(|e| FetchError::Read(e.to_string()))?;
    if !text.trim_start().starts_with('{') {
        return Err(FetchError::NotJson);
    }
    Ok(text)
}

#[cfg(target_os = "espidf")]
pub use esp::EspHttpsTransport;

#[cfg(target_os = "espidf")]
mod esp {
    use embedded_svc::http::client::Client;
    use embedded_svc::http::Method;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use log::{debug, info};
    use std::time::Duration;

    use super::{body_to_json_text, check_status, Transport, MAX_BODY_BYTES};
    use crate::weather::FetchError;

    const TIMEOUT_MS: u64 = 15_000;

    /// HTTPS over ESP-IDF, verifying servers against the built-in CA bundle.
    /// A fresh connection is opened for every request.
    pub struct EspHttpsTransport {
        timeout: Duration,
        logged_first: bool,
    }

    impl EspHttpsTransport {
        pub fn new() -> Self {
            Self {
                timeout: Duration::from_millis(TIMEOUT_MS),
                logged_first: false,
            }
        }
    }

    impl Default for EspHttpsTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for EspHttpsTransport {
        fn get(&mut self, url: &str) -> Result<String, FetchError> {
            let config = Configuration {
                timeout: Some(self.timeout),
                use_global_ca_store: true,
                crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
                ..Default::default()
            };

            let connection = EspHttpConnection::new(&config)
                .map_err(|e| FetchError::Connect(e.to_string()))?;
            let mut client = Client::wrap(connection);

            let headers = [("Accept", "application/json")];
            let request = client
                .request(Method::Get, url, &headers)
                .map_err(|e| FetchError::Connect(e.to_string()))?;
            let mut response = request
                .submit()
                .map_err(|e| FetchError::Headers(e.to_string()))?;

            let status = response.status();
            // The URL carries the API key; log only the path part.
            let path = url.split('?').next().unwrap_or(url);
            if self.logged_first {
                debug!("HTTP GET {} -> status {}", path, status);
            } else {
                info!("HTTP GET {} -> status {}", path, status);
                self.logged_first = true;
            }
            check_status(status)?;

            let mut body: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = response
                    .read(&mut buf)
                    .map_err(|e| FetchError::Read(e.to_string()))?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&buf[..n]);
                if body.len() > MAX_BODY_BYTES {
                    return Err(FetchError::TooLarge(MAX_BODY_BYTES));
                }
            }

            body_to_json_text(body)
        }
    }
}
