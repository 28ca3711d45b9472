use anyhow::Result;
use bakery_chat::commands;
use bakery_chat::config::{get_config_dir, run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bakery-chat")]
#[command(about = "Retrieval-augmented customer chatbot for a bakery storefront")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the index and the store information file
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the database, embedding model and LLM
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the chatbot HTTP API
    Serve {
        /// Rebuild the index from the shop data before serving
        #[arg(long)]
        rebuild: bool,
    },
    /// Rebuild and persist the knowledge index
    Rebuild,
    /// Show database, embedding, index and LLM status
    Status,
    /// Ask a question from the terminal, or chat interactively without one
    Ask {
        /// Question to answer
        question: Option<String>,
    },
    /// Create the shop tables
    InitDb {
        /// Also insert a small demo menu with orders
        #[arg(long)]
        sample_data: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Config { show } => {
            let dir = get_config_dir(config_dir)?;
            if show {
                show_config(&dir)?;
            } else {
                run_interactive_config(&dir)?;
            }
        }
        Commands::Serve { rebuild } => {
            commands::serve(config_dir, rebuild).await?;
        }
        Commands::Rebuild => {
            commands::rebuild(config_dir).await?;
        }
        Commands::Status => {
            commands::show_status(config_dir).await?;
        }
        Commands::Ask { question } => {
            commands::ask(config_dir, question.as_deref()).await?;
        }
        Commands::InitDb { sample_data } => {
            commands::init_db(config_dir, sample_data).await?;
        }
    }

    Ok(())
}
