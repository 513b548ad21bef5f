use clap::Subcommand;
use steadyday_core::Config;

use crate::common::{open_store, print_json, CliResult};

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List reminder templates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a reminder template
    Add {
        /// Template text
        text: String,
    },
    /// Switch a template on or off
    Toggle {
        /// Template id
        id: i64,
    },
}

pub async fn run(action: TemplateAction, config: Config) -> CliResult {
    let store = open_store(&config)?;
    match action {
        TemplateAction::List { json } => {
            let templates = store.list_templates().await?;
            if json {
                print_json(&templates)?;
            } else {
                for t in templates {
                    let mark = if t.active { "●" } else { "○" };
                    println!("{:>4} {mark} {}", t.id, t.text);
                }
            }
        }
        TemplateAction::Add { text } => {
            if store.add_template(&text).await? {
                println!("template added");
            } else {
                println!("template already exists");
            }
        }
        TemplateAction::Toggle { id } => match store.toggle_template(id).await? {
            Some(true) => println!("template {id} is now active"),
            Some(false) => println!("template {id} is now inactive"),
            None => return Err(format!("no template with id {id}").into()),
        },
    }
    Ok(())
}
