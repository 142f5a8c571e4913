use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::region::{DeviceType, RegionProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub region: RegionSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub accounts: Vec<AccountCredentials>,
}

/// Region, device and proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Region used when no proxy is active or its location cannot be resolved.
    #[serde(default = "default_region")]
    pub current: String,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default)]
    pub proxy_mode: ProxyMode,
    /// Fixed endpoint for static mode, e.g. "http://1.2.3.4:8080".
    #[serde(default)]
    pub proxy_url: String,
    #[serde(default)]
    pub proxy_api: Option<ProxyApiSettings>,
    #[serde(default)]
    pub profiles: HashMap<String, RegionProfile>,
}

fn default_region() -> String {
    "usa".to_string()
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            current: default_region(),
            device_type: DeviceType::default(),
            use_proxy: false,
            proxy_mode: ProxyMode::default(),
            proxy_url: String::new(),
            proxy_api: None,
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    #[default]
    Static,
    Dynamic,
}

/// Rotating proxy provisioning API. The endpoint returns a bare `ip:port` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyApiSettings {
    pub url: String,
    #[serde(default = "default_proxy_api_timeout")]
    pub timeout: u64,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_proxy_api_timeout() -> u64 {
    10
}

fn default_protocol() -> String {
    "http".to_string()
}

/// Hosted verification-mailbox service and polling behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,
    /// Overall wait for a verification code, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
    /// Sleep between mailbox fetches, in seconds. Coarser than the timeout.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_mail_api_url() -> String {
    "https://mail.chatgpt.org.uk/api".to_string()
}

fn default_wait_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_url: default_mail_api_url(),
            wait_timeout: default_wait_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout for proxy/mailbox API calls, in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,
}

fn default_http_timeout() -> u64 {
    15
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Per-worker startup delay factor. Worker `i` sleeps `i * stagger_seconds`
    /// before launching its browser driver, so that first-time driver
    /// initialization never runs concurrently.
    #[serde(default = "default_stagger_seconds")]
    pub stagger_seconds: u64,
    #[serde(default = "default_record_path")]
    pub record_path: String,
}

fn default_stagger_seconds() -> u64 {
    20
}

fn default_record_path() -> String {
    "accounts.jsonl".to_string()
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            stagger_seconds: default_stagger_seconds(),
            record_path: default_record_path(),
        }
    }
}

/// One input account. `client_id` + `refresh_token` together select the IMAP
/// backend for verification mail; without them the hosted service is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: RegionSettings::default(),
            email: EmailSettings::default(),
            http: HttpSettings::default(),
            batch: BatchSettings::default(),
            accounts: Vec::new(),
        }
    }
}
