use std::env;
use tracing::warn;

pub const DEFAULT_HOSPITAL_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hospital_api_url: String,
    pub hospital_api_token: Option<String>,
    pub notify_doctors: bool,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            hospital_api_url: env::var("HOSPITAL_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("HOSPITAL_API_URL not set, using default");
                    DEFAULT_HOSPITAL_API_URL.to_string()
                }),
            hospital_api_token: env::var("HOSPITAL_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            notify_doctors: env::var("NOTIFY_DOCTORS")
                .map(|value| parse_flag(&value).unwrap_or_else(|| {
                    warn!("NOTIFY_DOCTORS has unrecognised value {:?}, keeping notifications on", value);
                    true
                }))
                .unwrap_or(true),
            port: env::var("PORT")
                .ok()
                .and_then(|port| match port.parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!("PORT is not a valid port number: {}", port);
                        None
                    }
                })
                .unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - hospital API URL is empty");
        }

        config
    }

    /// Configuration pointing at an explicit backend, used by tests and tools.
    pub fn with_api_url(url: impl Into<String>) -> Self {
        Self {
            hospital_api_url: url.into().trim_end_matches('/').to_string(),
            hospital_api_token: None,
            notify_doctors: true,
            port: DEFAULT_PORT,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.hospital_api_url.is_empty()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
