mod cli_options;

pub use cli_options::CliOptions;

use secrecy::Secret;
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use url::Url;

/// Exit code for configuration failures, distinct from runtime errors.
pub const SETTINGS_EXIT_CODE: i32 = 78;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub proxy: ProxySettings,

    #[serde(default)]
    pub stations: StationsSettings,

    /// When absent the stream transport is used.
    #[serde(default)]
    pub http_port: Option<u16>,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub gazetteer: GazetteerSettings,
}

impl Settings {
    /// Defaults < optional config file < `NORDVAER_*` environment < CLI
    /// overrides.
    pub fn load(options: &CliOptions) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = options.config_path() {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("NORDVAER").separator("__"));
        let builder = options.load_overrides(builder)?;
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.proxy.base_url.cannot_be_a_base() {
            return Err(SettingsError::Invalid(format!(
                "proxy base url cannot be a base: {}",
                self.proxy.base_url
            )));
        }
        if self.auth.mode == AuthMode::ApiKey && self.auth.api_key.is_none() {
            return Err(SettingsError::Invalid(
                "auth mode `api-key` requires auth.api_key".to_string(),
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    pub base_url: Url,

    #[serde(alias = "timeout_ms", default = "default_proxy_timeout")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub timeout: Duration,

    #[serde(alias = "connect_timeout_ms", default = "default_connect_timeout")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub connect_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct StationsSettings {
    #[serde(default = "default_stations_base_url")]
    pub base_url: Url,

    #[serde(default)]
    pub client_id: Option<Secret<String>>,

    #[serde(alias = "timeout_ms", default = "default_stations_timeout")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for StationsSettings {
    fn default() -> Self {
        Self {
            base_url: default_stations_base_url(),
            client_id: None,
            timeout: default_stations_timeout(),
        }
    }
}

#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(&self) -> String {
        self.to_string()
    }
}

#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    #[default]
    None,
    ApiKey,
    Jwt,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub mode: AuthMode,

    #[serde(default)]
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GazetteerSettings {
    #[serde(default = "default_gazetteer_path")]
    pub path: PathBuf,
}

impl Default for GazetteerSettings {
    fn default() -> Self {
        Self { path: default_gazetteer_path() }
    }
}

fn default_proxy_timeout() -> Duration {
    Duration::from_millis(5_000)
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(2_000)
}

fn default_stations_timeout() -> Duration {
    Duration::from_millis(10_000)
}

fn default_stations_base_url() -> Url {
    Url::parse("https://frost.met.no").expect("default stations url is valid")
}

fn default_gazetteer_path() -> PathBuf {
    PathBuf::from("./data/gazetteer.db")
}
