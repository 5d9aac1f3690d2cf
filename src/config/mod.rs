mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AckMode, BatchSettings, BusSettings, ConsumerSettings, JournalSettings, ServerSettings,
    Settings,
};

#[cfg(test)]
mod tests;

/// Loads the configuration from the default file and environment variables
/// and merges it over the built-in defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Deserialize what is available, then fill the gaps from defaults.
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
