use steadyday_core::Config;

use crate::common::{open_store, print_json, CliResult};

pub async fn run(config: Config) -> CliResult {
    let store = open_store(&config)?;
    print_json(&store.admin_stats().await?)
}
