use clap::Subcommand;
use steadyday_core::Config;

use crate::common::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration (token masked)
    Show {
        /// Print as TOML instead of JSON
        #[arg(long)]
        toml: bool,
    },
    /// Get a config value
    Get {
        /// Config key (e.g. "default_timezone", "tick_seconds")
        key: String,
    },
}

pub fn run(action: ConfigAction, config: &Config) -> CliResult {
    match action {
        ConfigAction::Show { toml: false } => print_json(&config.redacted())?,
        ConfigAction::Show { toml: true } => print!("{}", toml::to_string_pretty(&config.redacted())?),
        ConfigAction::Get { key } => match config.redacted().get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(format!("unknown key: {key}").into()),
        },
    }
    Ok(())
}
