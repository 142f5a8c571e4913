use std::path::Path;

use crate::config::schema::{Config, ProxyMode};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.region.use_proxy {
        match config.region.proxy_mode {
            ProxyMode::Static => {
                if config.region.proxy_url.is_empty() {
                    return Err(ConfigError::Validation {
                        message: "use_proxy with static proxy_mode requires proxy_url".to_string(),
                    });
                }
            }
            ProxyMode::Dynamic => {
                let api_url_missing = config
                    .region
                    .proxy_api
                    .as_ref()
                    .map(|api| api.url.is_empty())
                    .unwrap_or(true);
                if api_url_missing {
                    return Err(ConfigError::Validation {
                        message: "use_proxy with dynamic proxy_mode requires proxy_api.url"
                            .to_string(),
                    });
                }
            }
        }
    }

    if let Some(api) = &config.region.proxy_api {
        if api.auth_required && (api.username.is_empty() || api.password.is_empty()) {
            return Err(ConfigError::Validation {
                message: "proxy_api.auth_required needs username and password".to_string(),
            });
        }
    }

    if config.email.poll_interval == 0 {
        return Err(ConfigError::Validation {
            message: "email.poll_interval must be at least 1 second".to_string(),
        });
    }

    for (i, account) in config.accounts.iter().enumerate() {
        if account.email.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("account {} has an empty email", i),
            });
        }
        if account.client_id.is_some() != account.refresh_token.is_some() {
            return Err(ConfigError::Validation {
                message: format!(
                    "account '{}' must set both client_id and refresh_token or neither",
                    account.email
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_config() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.region.current, "usa");
        assert!(!config.region.use_proxy);
        assert_eq!(config.email.wait_timeout, 120);
        assert_eq!(config.email.poll_interval, 5);
        assert_eq!(config.batch.stagger_seconds, 20);
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
region:
  current: germany
  device_type: mobile
  use_proxy: true
  proxy_mode: dynamic
  proxy_api:
    url: "http://proxy.example.com/get"
    protocol: socks5
    auth_required: true
    username: u
    password: p
  profiles:
    germany:
      locale: de-DE
      timezone: Europe/Berlin
      accept_language: "de-DE,de;q=0.9"
      desktop_user_agents: ["Mozilla/5.0 test"]
email:
  wait_timeout: 60
accounts:
  - email: a@outlook.com
    client_id: cid
    refresh_token: rt
  - email: b@example.com
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.region.current, "germany");
        assert_eq!(config.email.wait_timeout, 60);
        assert_eq!(config.accounts.len(), 2);
        let api = config.region.proxy_api.unwrap();
        assert_eq!(api.protocol, "socks5");
        assert_eq!(api.timeout, 10);
    }

    #[test]
    fn test_dynamic_mode_requires_api_url() {
        let yaml = r#"
region:
  use_proxy: true
  proxy_mode: dynamic
"#;
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_static_mode_requires_proxy_url() {
        let yaml = r#"
region:
  use_proxy: true
  proxy_mode: static
"#;
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_partial_oauth_credentials_rejected() {
        let yaml = r#"
accounts:
  - email: a@outlook.com
    client_id: cid
"#;
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("a@outlook.com"));
    }

    #[test]
    fn test_auth_required_needs_credentials() {
        let yaml = r#"
region:
  proxy_api:
    url: "http://proxy.example.com/get"
    auth_required: true
"#;
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = r#"
email:
  poll_interval: 0
"#;
        assert!(load_config_from_str(yaml).is_err());
    }
}
