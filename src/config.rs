//! Configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Public URL of the monitored service, used in alert text
    pub service_url: String,
    /// Display name of the monitored service, used in alert text
    pub service_name: String,
    /// Shared secret sent to the probe target and required at the API boundary
    pub api_key: String,
    /// Probe target base URL; falls back to `service_url` when unset
    pub main_service_url: Option<String>,
    /// Path appended to the probe target base URL
    pub ping_endpoint: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Listen port for the control/inspection API
    pub port: u16,
    pub check_interval: Duration,
    /// Where the alert state survives restarts
    pub state_file: PathBuf,
    /// Set when running under a CI scheduler; an unhealthy one-shot check
    /// then exits non-zero so the runner observes the failure
    pub ci_mode: bool,
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| crate::VigilError::Config(format!("Invalid PORT '{}': {}", raw, e)))?,
            None => default_port(),
        };

        let check_interval = match lookup("CHECK_INTERVAL") {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|e| {
                    crate::VigilError::Config(format!("Invalid CHECK_INTERVAL '{}': {}", raw, e))
                })?;
                Duration::from_millis(ms)
            }
            None => default_check_interval(),
        };

        Ok(Self {
            service_url: lookup("SERVICE_URL").unwrap_or_else(default_service_url),
            service_name: lookup("SERVICE_NAME").unwrap_or_else(default_service_name),
            api_key: lookup("API_KEY").unwrap_or_else(default_api_key),
            main_service_url: lookup("MAIN_SERVICE_URL"),
            ping_endpoint: lookup("PING_ENDPOINT").unwrap_or_else(default_ping_endpoint),
            telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: lookup("TELEGRAM_CHAT_ID"),
            port,
            check_interval,
            state_file: lookup("ALERT_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_state_file),
            ci_mode: lookup("GITHUB_ACTIONS").is_some(),
        })
    }

    /// Full URL the prober targets
    pub fn probe_url(&self) -> String {
        let base = self.main_service_url.as_deref().unwrap_or(&self.service_url);
        format!("{}{}", base, self.ping_endpoint)
    }
}

fn default_service_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_service_name() -> String {
    "Upstream Service".to_string()
}

fn default_api_key() -> String {
    "your-local-api-key".to_string()
}

fn default_ping_endpoint() -> String {
    "/ping".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_check_interval() -> Duration {
    Duration::from_millis(60_000)
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".alert-state.json")
}
