use clap::{Parser, Subcommand};
use std::path::PathBuf;

use steadyday_cli::commands;
use steadyday_cli::common::{load_config, CliResult};

#[derive(Parser)]
#[command(name = "steadyday", version, about = "Steadyday daily check-in bot")]
struct Cli {
    /// Config file (default: ~/.config/steadyday/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: update polling plus the reminder scheduler
    Run,
    /// Run a single scheduler pass
    Tick,
    /// Aggregate usage statistics
    Stats,
    /// Export one user's data as JSON
    ExportUser {
        user_id: i64,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write a snapshot of the database
    Backup {
        /// Destination file (default: ./steadyday-backup-<stamp>.sqlite)
        dest: Option<PathBuf>,
    },
    /// Delete every row belonging to a user
    DeleteUser {
        user_id: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Reminder template management
    Templates {
        #[command(subcommand)]
        action: commands::templates::TemplateAction,
    },
    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

async fn dispatch(cli: Cli) -> CliResult {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run => commands::run::run(config).await,
        Commands::Tick => commands::tick::run(config).await,
        Commands::Stats => commands::stats::run(config).await,
        Commands::ExportUser { user_id, output } => {
            commands::data::export_user(config, user_id, output).await
        }
        Commands::Backup { dest } => commands::data::backup(config, dest).await,
        Commands::DeleteUser { user_id, yes } => {
            commands::data::delete_user(config, user_id, yes).await
        }
        Commands::Templates { action } => commands::templates::run(action, config).await,
        Commands::Config { action } => commands::config::run(action, &config),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
