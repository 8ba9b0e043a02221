use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Persisted settings. The bearer token is deliberately absent; it only ever
/// comes from a flag or the environment.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// API root the chat endpoints hang off (e.g., "https://chat.example.com/api")
    pub base_url: Option<String>,
    /// Team used by `say` and `resume` when `--team` is omitted
    pub default_team: Option<i64>,
    /// Connect timeout for every request, in seconds
    pub timeout_secs: Option<u64>,
}

/// Keys accepted by `chatrelay set` / `chatrelay unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    DefaultTeam,
    TimeoutSecs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 3] = [
        ConfigKey::BaseUrl,
        ConfigKey::DefaultTeam,
        ConfigKey::TimeoutSecs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::DefaultTeam => "default-team",
            ConfigKey::TimeoutSecs => "timeout-secs",
        }
    }

    pub fn parse(input: &str) -> Result<Self, SettingError> {
        let normalized = input.trim().replace('_', "-").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.name() == normalized)
            .ok_or_else(|| SettingError::UnknownKey(input.to_string()))
    }
}

/// Errors that can occur when modifying configuration settings.
#[derive(Debug, PartialEq, Eq)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The value for a numeric key could not be parsed.
    InvalidNumber { key: &'static str, input: String },
    /// The value is empty where one is required.
    EmptyValue { key: &'static str },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => {
                let known: Vec<_> = ConfigKey::ALL.iter().map(|key| key.name()).collect();
                write!(f, "Unknown config key: {key} (expected one of {})", known.join(", "))
            }
            SettingError::InvalidNumber { key, input } => {
                write!(f, "Invalid value for {key}: {input} is not a whole number")
            }
            SettingError::EmptyValue { key } => write!(f, "A value is required for {key}"),
        }
    }
}

impl std::error::Error for SettingError {}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
