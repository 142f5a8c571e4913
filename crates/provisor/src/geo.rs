//! IP geolocation over an ordered list of independent providers.
//!
//! Providers are tried strictly in priority order; the first structurally
//! valid success wins and later providers are never consulted. Every failure
//! mode of a single provider (transport error, non-200, malformed JSON,
//! provider-reported failure) is soft and advances to the next entry.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;

use crate::region::DEFAULT_REGION;

/// Per-provider request timeout. Geolocation is best-effort and must never
/// stall a worker for long.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Location data returned by a geolocation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoLocation {
    pub country_code: String,
    pub country: String,
    pub timezone: String,
    pub city: String,
    pub region_name: String,
    pub isp: String,
}

/// Region inference derived from a resolved IP, with a hardcoded default when
/// no provider answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHint {
    pub region: String,
    pub country_code: String,
    pub country: String,
    pub timezone: String,
    pub city: String,
    pub isp: String,
}

impl RegionHint {
    fn default_usa() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            country_code: "US".to_string(),
            country: "United States".to_string(),
            timezone: "America/New_York".to_string(),
            city: String::new(),
            isp: String::new(),
        }
    }
}

/// One provider strategy: how to build the lookup URL and how to read the
/// provider-specific response shape.
pub struct GeoProvider {
    pub name: &'static str,
    url: fn(&str) -> String,
    parse: fn(&Value) -> Option<GeoLocation>,
}

/// Priority-ordered provider table.
const PROVIDERS: &[GeoProvider] = &[
    GeoProvider {
        name: "ip-api.com",
        url: |ip| format!("http://ip-api.com/json/{}", ip),
        parse: parse_ip_api,
    },
    GeoProvider {
        name: "ipapi.co",
        url: |ip| format!("https://ipapi.co/{}/json/", ip),
        parse: parse_ipapi_co,
    },
    GeoProvider {
        name: "ipwhois.app",
        url: |ip| format!("http://ipwhois.app/json/{}", ip),
        parse: parse_ipwhois,
    },
];

pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

fn field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// ip-api.com reports failures in a `status` field and uses camelCase keys.
fn parse_ip_api(value: &Value) -> Option<GeoLocation> {
    if value.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }

    Some(GeoLocation {
        country_code: field(value, "countryCode"),
        country: field(value, "country"),
        timezone: field(value, "timezone"),
        city: field(value, "city"),
        region_name: field(value, "regionName"),
        isp: field(value, "isp"),
    })
}

/// ipapi.co has no explicit success field; a missing country code is the
/// failure signal.
fn parse_ipapi_co(value: &Value) -> Option<GeoLocation> {
    Some(GeoLocation {
        country_code: field(value, "country_code"),
        country: field(value, "country_name"),
        timezone: field(value, "timezone"),
        city: field(value, "city"),
        region_name: field(value, "region"),
        isp: field(value, "org"),
    })
}

fn parse_ipwhois(value: &Value) -> Option<GeoLocation> {
    if value.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    Some(GeoLocation {
        country_code: field(value, "country_code"),
        country: field(value, "country"),
        timezone: field(value, "timezone"),
        city: field(value, "city"),
        region_name: field(value, "region"),
        isp: field(value, "isp"),
    })
}

/// Resolves an IP to a location using the first provider that answers with a
/// structurally valid, non-empty country code. Returns `None` when every
/// provider fails; never returns an error.
pub async fn resolve(client: &reqwest::Client, ip: &str) -> Option<GeoLocation> {
    for provider in PROVIDERS {
        debug!("Querying geolocation provider {} for {}", provider.name, ip);

        let response = match client
            .get((provider.url)(ip))
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping {}: {}", provider.name, e);
                continue;
            }
        };

        if !response.status().is_success() {
            debug!(
                "Skipping {}: HTTP {}",
                provider.name,
                response.status().as_u16()
            );
            continue;
        }

        let value: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping {}: malformed JSON: {}", provider.name, e);
                continue;
            }
        };

        if let Some(location) = (provider.parse)(&value) {
            if !location.country_code.is_empty() {
                info!(
                    "Resolved {} to {} ({}) via {}",
                    ip, location.country, location.country_code, provider.name
                );
                return Some(location);
            }
        }
    }

    warn!("No geolocation provider could resolve {}", ip);
    None
}

/// Maps a two-letter country code onto a configured region. Total: unmapped
/// or malformed codes yield the default region.
pub fn map_country_to_region(country_code: &str) -> &'static str {
    match country_code.to_ascii_uppercase().as_str() {
        // German-speaking countries
        "DE" | "AT" | "CH" => "germany",
        "JP" => "japan",
        // English-speaking countries
        "US" | "CA" | "GB" | "AU" | "NZ" | "IE" => DEFAULT_REGION,
        _ => DEFAULT_REGION,
    }
}

/// Resolves an IP into a region hint, falling back to the usa default when no
/// provider answers.
pub async fn region_hint_from_ip(client: &reqwest::Client, ip: &str) -> RegionHint {
    match resolve(client, ip).await {
        Some(location) => RegionHint {
            region: map_country_to_region(&location.country_code).to_string(),
            country_code: location.country_code,
            country: location.country,
            timezone: location.timezone,
            city: location.city,
            isp: location.isp,
        },
        None => RegionHint::default_usa(),
    }
}
