use super::SettingsError;
use clap::Parser;
use config::builder::DefaultState;
use config::ConfigBuilder;
use std::path::PathBuf;

#[derive(Debug, Default, Parser, PartialEq, Eq)]
#[clap(author, version, about)]
pub struct CliOptions {
    /// Explicit configuration file to load before environment overrides.
    #[clap(short, long, value_name = "PATH_TO_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Serve the HTTP transport on this port instead of the stdio transport.
    #[clap(long, value_name = "PORT")]
    pub http_port: Option<u16>,

    /// Override the configured log level (debug, info, warn, error).
    #[clap(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Override the gazetteer file path.
    #[clap(long, value_name = "PATH_TO_GAZETTEER")]
    pub gazetteer: Option<PathBuf>,
}

impl CliOptions {
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone()
    }

    pub(crate) fn load_overrides(
        &self, config: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, SettingsError> {
        let config = match self.http_port {
            None => config,
            Some(port) => config.set_override("http_port", i64::from(port))?,
        };

        let config = match &self.log_level {
            None => config,
            Some(level) => config.set_override("log_level", level.as_str())?,
        };

        let config = match &self.gazetteer {
            None => config,
            Some(path) => {
                config.set_override("gazetteer.path", path.to_string_lossy().to_string())?
            },
        };

        Ok(config)
    }
}
