//! Chat Launcher CLI - Database migrations and tenant inspection.
//!
//! # Usage
//!
//! ```bash
//! # Apply PostgreSQL migrations (DATABASE_URL)
//! chat-launcher-cli migrate
//!
//! # List installed tenants from the configured store
//! chat-launcher-cli installations list
//!
//! # List installed tenants from a specific backend
//! chat-launcher-cli installations list --backend file
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "chat-launcher-cli")]
#[command(author, version, about = "Chat Launcher CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations to `DATABASE_URL`
    Migrate,
    /// Inspect tenant installations
    Installations {
        #[command(subcommand)]
        action: InstallationsAction,
    },
}

#[derive(Subcommand)]
enum InstallationsAction {
    /// Print every installed tenant and when it was installed
    List {
        /// Store backend (`file` or `postgres`); defaults to `APP_STORE_BACKEND`
        #[arg(short, long)]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Installations { action } => match action {
            InstallationsAction::List { backend } => {
                commands::installations::list(backend.as_deref()).await?;
            }
        },
    }
    Ok(())
}
