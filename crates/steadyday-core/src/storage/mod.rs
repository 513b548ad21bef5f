mod config;
pub mod migrations;
pub mod store;

pub use config::Config;
pub use store::{Store, UserDefaults};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/steadyday[-dev]/` based on STEADYDAY_ENV.
///
/// Set STEADYDAY_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STEADYDAY_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("steadyday-dev")
    } else {
        base_dir.join("steadyday")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
