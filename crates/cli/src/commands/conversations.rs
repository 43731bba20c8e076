//! `tiller conversations` — list and delete stored conversations.

use clap::Subcommand;

use tiller_config::AppConfig;
use tiller_store::{ConversationStore, JsonFileStore};

#[derive(Subcommand)]
pub enum Action {
    /// List stored conversations, most recent first
    List,

    /// Delete a conversation by id
    Delete {
        /// The conversation id
        id: String,
    },
}

pub async fn run(action: Action) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = JsonFileStore::new(config.store.dir);

    match action {
        Action::List => {
            let listing = store.list().await?;
            if listing.is_empty() {
                println!("No stored conversations.");
                return Ok(());
            }
            for entry in listing {
                println!(
                    "{}  {}  ({} turns, {})",
                    entry.id,
                    entry.title,
                    entry.turn_count,
                    entry.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Action::Delete { id } => {
            store.delete(&id).await?;
            println!("Deleted conversation {id}.");
        }
    }

    Ok(())
}
