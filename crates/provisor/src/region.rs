//! Read-only region profiles: locale, timezone and browser identity per region.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Region every lookup falls back to.
pub const DEFAULT_REGION: &str = "usa";

const DEFAULT_MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
}

/// One geographic operating context. Loaded once from configuration and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionProfile {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default)]
    pub desktop_user_agents: Vec<String>,
    #[serde(default)]
    pub mobile_user_agents: Vec<String>,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

impl Default for RegionProfile {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            timezone: default_timezone(),
            accept_language: default_accept_language(),
            desktop_user_agents: Vec::new(),
            mobile_user_agents: Vec::new(),
        }
    }
}

/// Profile table shared read-only across all workers. Lookups are total: an
/// unknown region yields the `usa` profile, and a missing `usa` profile yields
/// a compiled-in default.
pub struct RegionProfiles {
    profiles: HashMap<String, RegionProfile>,
    fallback: RegionProfile,
}

impl RegionProfiles {
    pub fn new(profiles: HashMap<String, RegionProfile>) -> Self {
        let fallback = profiles
            .get(DEFAULT_REGION)
            .cloned()
            .unwrap_or_default();
        Self { profiles, fallback }
    }

    pub fn profile(&self, region: &str) -> &RegionProfile {
        self.profiles.get(region).unwrap_or(&self.fallback)
    }

    /// Picks a user agent for the region and device type. An empty mobile
    /// list falls back to the desktop list; an empty desktop list falls back
    /// to a freshly synthesized Chrome identity (mobile keeps one hardcoded
    /// default, since the synthesizer only produces desktop agents).
    pub fn user_agent(&self, region: &str, device: DeviceType) -> String {
        let profile = self.profile(region);

        let pool = match device {
            DeviceType::Mobile if !profile.mobile_user_agents.is_empty() => {
                &profile.mobile_user_agents
            }
            _ => &profile.desktop_user_agents,
        };

        if let Some(ua) = pool.choose(&mut rand::thread_rng()) {
            return ua.clone();
        }

        match device {
            DeviceType::Mobile => DEFAULT_MOBILE_UA.to_string(),
            DeviceType::Desktop => synthetic_user_agent(),
        }
    }
}

/// Builds a Windows Chrome user agent with a freshly randomized version on
/// every call, so concurrent workers rarely present the same identity. A
/// static list would collide across workers and is easy to fingerprint.
pub fn synthetic_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let major: u32 = rng.gen_range(119..=124);
    let build: u32 = rng.gen_range(6000..=6999);
    let patch: u32 = rng.gen_range(100..=200);

    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{}.0.{}.{} Safari/537.36",
        major, build, patch
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profiles() -> RegionProfiles {
        let mut map = HashMap::new();
        map.insert(
            "usa".to_string(),
            RegionProfile {
                locale: "en-US".to_string(),
                timezone: "America/New_York".to_string(),
                accept_language: "en-US,en;q=0.9".to_string(),
                desktop_user_agents: vec!["ua-desktop-usa".to_string()],
                mobile_user_agents: vec![],
            },
        );
        map.insert(
            "germany".to_string(),
            RegionProfile {
                locale: "de-DE".to_string(),
                timezone: "Europe/Berlin".to_string(),
                accept_language: "de-DE,de;q=0.9".to_string(),
                desktop_user_agents: vec!["ua-desktop-de".to_string()],
                mobile_user_agents: vec!["ua-mobile-de".to_string()],
            },
        );
        RegionProfiles::new(map)
    }

    #[test]
    fn test_known_region_lookup() {
        let profiles = sample_profiles();
        assert_eq!(profiles.profile("germany").locale, "de-DE");
    }

    #[test]
    fn test_unknown_region_falls_back_to_usa() {
        let profiles = sample_profiles();
        assert_eq!(profiles.profile("atlantis").locale, "en-US");
        assert_eq!(profiles.profile("atlantis").timezone, "America/New_York");
    }

    #[test]
    fn test_empty_table_uses_builtin_default() {
        let profiles = RegionProfiles::new(HashMap::new());
        assert_eq!(profiles.profile("usa").locale, "en-US");
    }

    #[test]
    fn test_mobile_falls_back_to_desktop_list() {
        let profiles = sample_profiles();
        // usa has no mobile UAs, so the desktop list is used
        assert_eq!(
            profiles.user_agent("usa", DeviceType::Mobile),
            "ua-desktop-usa"
        );
        assert_eq!(
            profiles.user_agent("germany", DeviceType::Mobile),
            "ua-mobile-de"
        );
    }

    #[test]
    fn test_empty_lists_fall_back_to_builtin_agents() {
        let profiles = RegionProfiles::new(HashMap::new());
        let desktop = profiles.user_agent("usa", DeviceType::Desktop);
        assert!(desktop.contains("Windows NT 10.0"));
        assert!(desktop.contains("Chrome/"));
        let mobile = profiles.user_agent("usa", DeviceType::Mobile);
        assert!(mobile.contains("iPhone"));
    }

    #[test]
    fn test_synthetic_user_agent_shape() {
        let re = regex::Regex::new(r"Chrome/(\d+)\.0\.(\d+)\.(\d+) Safari/537\.36$").unwrap();
        for _ in 0..50 {
            let ua = synthetic_user_agent();
            let caps = re.captures(&ua).expect("generated UA should match shape");
            let major: u32 = caps[1].parse().unwrap();
            let build: u32 = caps[2].parse().unwrap();
            let patch: u32 = caps[3].parse().unwrap();
            assert!((119..=124).contains(&major));
            assert!((6000..=6999).contains(&build));
            assert!((100..=200).contains(&patch));
        }
    }
}
