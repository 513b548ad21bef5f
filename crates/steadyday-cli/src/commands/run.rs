use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use steadyday_core::scheduler::{ReminderScheduler, SchedulerConfig};
use steadyday_core::{Config, Router};

use crate::common::{messenger, open_store, CliResult};
use crate::telegram::Poller;

/// Serve the bot until Ctrl-C.
pub async fn run(config: Config) -> CliResult {
    let client = messenger(&config)?;
    match client.get_me().await {
        Ok(name) => info!(bot = %name, "connected to Telegram"),
        Err(e) => warn!(error = %e, "getMe failed, continuing"),
    }

    let store = open_store(&config)?;
    let scheduler = ReminderScheduler::new(
        store.clone(),
        client.clone(),
        SchedulerConfig::from_config(&config),
    );
    let router = Router::new(store.clone(), scheduler.clone(), &config).into_shared();

    scheduler.start().await;
    let (shutdown, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(Poller::new(client, Arc::clone(&router)).run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // A closed channel also stops the poller.
    let _ = shutdown.send(true);
    if let Err(e) = poller.await {
        error!(error = %e, "poller task ended abnormally");
    }
    scheduler.stop().await;
    drop(router);
    drop(scheduler);
    store.close().await?;
    Ok(())
}
