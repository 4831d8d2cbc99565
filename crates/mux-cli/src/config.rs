//! On-disk (`ConfigToml`) / resolved (`Config`) split for `mux.toml`, so a
//! field added to the file format never breaks a config written by an older
//! binary: every on-disk field is `Option`, defaulted during `Config::resolve`.

use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, PartialEq)]
pub struct ConfigToml {
    #[serde(default)]
    pub mux_home: Option<PathBuf>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub provider_supports_prompt_cache: Option<bool>,
    #[serde(default)]
    pub provider: Option<ProviderToml>,
    #[serde(default)]
    pub logging: Option<LoggingToml>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, PartialEq)]
pub struct ProviderToml {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, PartialEq)]
pub struct LoggingToml {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Resolved runtime shape: every field present, defaults already applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub mux_home: PathBuf,
    pub default_model: String,
    pub provider_supports_prompt_cache: bool,
    pub provider_name: String,
    pub provider_api_key_env: String,
    pub log_level: String,
    pub log_timezone: Timezone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timezone {
    Local,
    Utc,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let on_disk = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => ConfigToml::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self::resolve(on_disk))
    }

    fn resolve(on_disk: ConfigToml) -> Self {
        let provider = on_disk.provider.unwrap_or_default();
        let logging = on_disk.logging.unwrap_or_default();
        let mux_home = on_disk.mux_home.unwrap_or_else(default_mux_home);
        Self {
            mux_home,
            default_model: on_disk.default_model.unwrap_or_else(|| "gpt-5".to_string()),
            provider_supports_prompt_cache: on_disk.provider_supports_prompt_cache.unwrap_or(false),
            provider_name: provider.name.unwrap_or_else(|| "openai".to_string()),
            provider_api_key_env: provider.api_key_env.unwrap_or_else(|| "OPENAI_API_KEY".to_string()),
            log_level: logging.level.unwrap_or_else(|| "info".to_string()),
            log_timezone: match logging.timezone.as_deref() {
                Some("utc") => Timezone::Utc,
                _ => Timezone::Local,
            },
        }
    }

    /// `None` if the configured provider's API key environment variable is set.
    pub fn missing_api_key(&self) -> Option<&str> {
        if std::env::var_os(&self.provider_api_key_env).is_none() {
            Some(&self.provider_api_key_env)
        } else {
            None
        }
    }
}

fn default_mux_home() -> PathBuf {
    dirs_home().join(".mux")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}
