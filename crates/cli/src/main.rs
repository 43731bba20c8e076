//! Tiller CLI — the main entry point.
//!
//! Commands:
//! - `init`          — Write a default config file
//! - `ask`           — Send a message to the assistant
//! - `conversations` — List or delete stored conversations

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tiller",
    about = "Tiller — a conversational coding assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.tiller/config.toml
    Init,

    /// Send a message to the assistant
    Ask {
        /// The message to send
        message: String,

        /// Plan the work into steps before executing
        #[arg(long)]
        plan: bool,

        /// Continue a stored conversation by id
        #[arg(short, long)]
        conversation: Option<String>,

        /// Attach an image file (repeatable)
        #[arg(long)]
        image: Vec<PathBuf>,
    },

    /// Manage stored conversations
    Conversations {
        #[command(subcommand)]
        action: commands::conversations::Action,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run()?,
        Commands::Ask {
            message,
            plan,
            conversation,
            image,
        } => commands::ask::run(message, plan, conversation, image).await?,
        Commands::Conversations { action } => commands::conversations::run(action).await?,
    }

    Ok(())
}
