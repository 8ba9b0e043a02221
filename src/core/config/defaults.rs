use std::time::Duration;

use crate::core::config::data::{Config, ConfigKey, SettingError};
use crate::utils::url::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const BASE_URL_ENV: &str = "CHATRELAY_BASE_URL";
pub const TOKEN_ENV: &str = "CHATRELAY_TOKEN";

impl Config {
    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), SettingError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SettingError::EmptyValue { key: key.name() });
        }

        match key {
            ConfigKey::BaseUrl => self.base_url = Some(normalize_base_url(value)),
            ConfigKey::DefaultTeam => self.default_team = Some(parse_number(key, value)?),
            ConfigKey::TimeoutSecs => self.timeout_secs = Some(parse_number(key, value)?),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::DefaultTeam => self.default_team = None,
            ConfigKey::TimeoutSecs => self.timeout_secs = None,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: ConfigKey, value: &str) -> Result<T, SettingError> {
    value.parse().map_err(|_| SettingError::InvalidNumber {
        key: key.name(),
        input: value.to_string(),
    })
}

/// Where to connect and with which credential, after layering flags,
/// environment and the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

impl ConnectionSettings {
    /// Flags win over the environment, which wins over the config file.
    pub fn resolve(
        config: &Config,
        base_url_flag: Option<&str>,
        token_flag: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |value: String| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        };

        let base_url = base_url_flag
            .map(str::to_string)
            .and_then(non_empty)
            .or_else(|| env(BASE_URL_ENV).and_then(non_empty))
            .or_else(|| config.base_url.clone().and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let token = token_flag
            .map(str::to_string)
            .and_then(non_empty)
            .or_else(|| env(TOKEN_ENV).and_then(non_empty));

        Self {
            base_url: normalize_base_url(&base_url),
            token,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn from_env(config: &Config, base_url_flag: Option<&str>, token_flag: Option<&str>) -> Self {
        Self::resolve(config, base_url_flag, token_flag, |name| {
            std::env::var(name).ok()
        })
    }
}
