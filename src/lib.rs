#[macro_use]
extern crate serde;

#[macro_use]
extern crate tracing;

pub mod context;
pub mod errors;
pub mod gazetteer;
pub mod metrics;
pub mod model;
pub mod resources;
pub mod server;
pub mod services;
mod settings;
pub mod setup_tracing;
pub mod tools;

pub use settings::{AuthMode, CliOptions, LogLevel, Settings, SettingsError, SETTINGS_EXIT_CODE};
