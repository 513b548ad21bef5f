use std::path::Path;
use std::sync::Arc;

use steadyday_core::{Config, Store, UserDefaults};
use tracing_subscriber::EnvFilter;

use crate::telegram::TelegramMessenger;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second install (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load, overlay the environment, and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load(path)?;
    init_logging(&config.log_level);
    Ok(config.validate()?)
}

pub fn open_store(config: &Config) -> Result<Store, Box<dyn std::error::Error>> {
    let path = config.db_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Store::open(&path, UserDefaults::from_config(config))?)
}

pub fn messenger(config: &Config) -> Result<Arc<TelegramMessenger>, Box<dyn std::error::Error>> {
    let token = config.require_token()?;
    Ok(Arc::new(TelegramMessenger::new(&config.api_base, token)))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
