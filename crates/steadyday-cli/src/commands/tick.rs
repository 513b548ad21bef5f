use steadyday_core::scheduler::{ReminderScheduler, SchedulerConfig, TickOutcome};
use steadyday_core::Config;

use crate::common::{messenger, open_store, print_json, CliResult};

/// Run one scheduler pass and print its counters.
pub async fn run(config: Config) -> CliResult {
    let store = open_store(&config)?;
    let scheduler = ReminderScheduler::new(
        store.clone(),
        messenger(&config)?,
        SchedulerConfig::from_config(&config),
    );
    match scheduler.tick().await? {
        TickOutcome::Ran(report) => print_json(&report)?,
        TickOutcome::Coalesced => println!("a tick is already running"),
    }
    drop(scheduler);
    store.close().await?;
    Ok(())
}
