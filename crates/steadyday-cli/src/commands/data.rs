use std::path::PathBuf;

use steadyday_core::Config;

use crate::common::{open_store, print_json, CliResult};

/// Print one user's data as JSON, or write it to `output`.
pub async fn export_user(config: Config, user_id: i64, output: Option<PathBuf>) -> CliResult {
    let store = open_store(&config)?;
    let export = store.export_user(user_id).await?;
    if export.user.is_none() {
        return Err(format!("no user with id {user_id}").into());
    }
    match output {
        Some(path) => {
            std::fs::write(&path, serde_json::to_vec_pretty(&export)?)?;
            println!("export written to {}", path.display());
        }
        None => print_json(&export)?,
    }
    Ok(())
}

/// Write a consistent snapshot of the database.
///
/// Without `dest` the snapshot lands in the working directory, stamped with
/// the current UTC time.
pub async fn backup(config: Config, dest: Option<PathBuf>) -> CliResult {
    let dest = dest.unwrap_or_else(|| {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        PathBuf::from(format!("steadyday-backup-{stamp}.sqlite"))
    });
    let store = open_store(&config)?;
    store.backup_to(&dest).await?;
    println!("backup written to {}", dest.display());
    Ok(())
}

pub async fn delete_user(config: Config, user_id: i64, yes: bool) -> CliResult {
    if !yes {
        return Err("refusing to delete without --yes".into());
    }
    let store = open_store(&config)?;
    store.delete_user(user_id).await?;
    let left = store.footprint(user_id).await?;
    if !left.is_empty() {
        return Err(format!("rows left after delete: {left:?}").into());
    }
    println!("user {user_id} deleted");
    Ok(())
}
