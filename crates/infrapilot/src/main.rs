//! # InfraPilot CLI (`pilot`)
//!
//! The `pilot` binary is the primary interface for InfraPilot. It
//! provides commands for database initialization, the chat HTTP server,
//! an interactive terminal chat, and intent inspection.
//!
//! ## Usage
//!
//! ```bash
//! pilot --config ./config/pilot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pilot init` | Create the SQLite database and run schema migrations |
//! | `pilot serve` | Start the chat HTTP server |
//! | `pilot chat` | Chat interactively from the terminal |
//! | `pilot intents` | List registered intents and their slots |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! pilot init --config ./config/pilot.toml
//!
//! # Talk to the agent locally
//! GOOGLE_API_KEY=... pilot chat
//!
//! # Start the HTTP server for the web frontend
//! GOOGLE_API_KEY=... pilot serve
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use infrapilot::chat::{run_repl, ChatService};
use infrapilot::config::{load_config, Config};
use infrapilot::providers;
use infrapilot::server::run_server;
use infrapilot::sqlite_store::SqliteStore;
use infrapilot::{db, migrate};
use infrapilot_core::engine::DialogueEngine;

/// InfraPilot CLI — a conversational agent that turns multi-turn chat
/// into infrastructure-as-code.
#[derive(Parser)]
#[command(
    name = "pilot",
    about = "InfraPilot — a conversational agent for generating infrastructure-as-code",
    version,
    long_about = "InfraPilot detects the user's deployment intent, collects the required \
    parameters one question at a time, and generates infrastructure code once every \
    parameter is filled. Conversations are served over HTTP or an interactive terminal chat."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the conversations table.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Start the chat HTTP server.
    ///
    /// Exposes `POST /chat` and `GET /health` on the configured bind
    /// address, with permissive CORS for browser frontends.
    Serve,

    /// Chat interactively from the terminal.
    ///
    /// Runs the same turn pipeline as the HTTP server against the local
    /// database. Type `exit` to quit.
    Chat,

    /// List registered intents and their slots.
    Intents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Serve => {
            let service = build_service(&config).await?;
            run_server(&config, service).await?;
        }
        Commands::Chat => {
            let service = build_service(&config).await?;
            run_repl(&service).await?;
        }
        Commands::Intents => {
            print_intents(&config);
        }
    }

    Ok(())
}

/// Wire the store, providers, and engine together from config.
///
/// Migrations run here as well: they are idempotent, and both `serve`
/// and `chat` need the schema in place.
async fn build_service(config: &Config) -> anyhow::Result<Arc<ChatService>> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let registry = Arc::new(config.registry());
    let classifier = providers::create_classifier(&config.classifier)?;
    let generator = providers::create_generator(&config.generator)?;

    let engine = DialogueEngine::new(registry, classifier, generator)
        .with_threshold(config.classifier.threshold);

    Ok(Arc::new(ChatService::new(store, engine)))
}

fn print_intents(config: &Config) {
    let registry = config.registry();

    println!("Registered intents:\n");
    for intent in registry.all() {
        println!(
            "  {} — {} ({} slots)",
            intent.id,
            intent.description,
            intent.slots.len()
        );
        for slot in &intent.slots {
            println!("    {}: {}", slot.name, slot.prompt);
        }
        println!();
    }
}
