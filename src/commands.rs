use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::ChatError;
use crate::answer::{Answer, ConversationTurn, TurnRole};
use crate::chatbot::Chatbot;
use crate::config::{Config, EmbeddingProvider, get_config_dir};
use crate::database::Database;
use crate::embeddings::{self, OllamaClient};
use crate::index::{KnowledgeBase, RebuildReport, persist};
use crate::knowledge::KnowledgeExtractor;
use crate::llm::{GroqClient, LlmProvider};
use crate::server::{self, AppState};

/// Everything the long-running commands share
struct Services {
    config: Config,
    database: Database,
    knowledge: Arc<KnowledgeBase>,
}

impl Services {
    async fn open(config_dir: Option<&Path>) -> Result<Self> {
        let config = load_config(config_dir)?;
        let database = Database::connect(&config)
            .await
            .context("Failed to open storefront database")?;
        let embedder = embeddings::from_config(&config).context("Failed to create embedder")?;

        let knowledge = Arc::new(KnowledgeBase::new(
            KnowledgeExtractor::from_config(&config),
            Arc::new(database.clone()),
            embedder,
            config.index_path(),
        ));

        Ok(Self {
            config,
            database,
            knowledge,
        })
    }

    /// Serve the persisted index, building one if none exists yet. A persisted
    /// index built with another embedding model is fatal.
    async fn prepare_index(&self, force_rebuild: bool) -> Result<()> {
        if !force_rebuild {
            match self.knowledge.load_persisted().await {
                Ok(Some(header)) => {
                    info!(
                        "Serving persisted index with {} documents built at {}",
                        header.document_count, header.built_at
                    );
                    return Ok(());
                }
                Ok(None) => info!("No persisted index found, building one"),
                Err(e @ ChatError::ModelMismatch { .. }) => return Err(e.into()),
                Err(e) => warn!("Persisted index unusable, rebuilding: {}", e),
            }
        }

        match rebuild_with_spinner(&self.knowledge).await {
            Ok(report) => {
                print_report(&report);
                Ok(())
            }
            Err(e) => {
                warn!("Initial index build failed: {}", e);
                eprintln!("⚠️  Index build failed: {e}");
                eprintln!("   Questions get the general help answer until a refresh succeeds.");
                Ok(())
            }
        }
    }

    fn chatbot(&self) -> Result<Option<Arc<Chatbot>>> {
        let api_key = match self.config.llm_api_key() {
            Ok(key) => key,
            Err(e) => {
                warn!("{}; chatbot queries are disabled", e);
                return Ok(None);
            }
        };
        let llm: Arc<dyn LlmProvider> = Arc::new(
            GroqClient::new(&self.config.llm, api_key).context("Failed to create LLM client")?,
        );
        Ok(Some(Arc::new(Chatbot::from_config(
            &self.config,
            &self.knowledge,
            llm,
        ))))
    }
}

fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = get_config_dir(config_dir)?;
    Config::load(&dir).context("Failed to load configuration")
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn rebuild_with_spinner(knowledge: &Arc<KnowledgeBase>) -> crate::Result<RebuildReport> {
    let bar = spinner("Rebuilding knowledge index");
    let result = knowledge.refresh().await;
    bar.finish_and_clear();
    result
}

fn print_report(report: &RebuildReport) {
    println!(
        "✅ Indexed {} documents with {} at {}",
        report.documents,
        report.embedding_model,
        report.built_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !report.persisted {
        println!("⚠️  The index could not be written to disk and lives in memory only");
    }
}

/// Start the HTTP API
#[inline]
pub async fn serve(config_dir: Option<&Path>, rebuild: bool) -> Result<()> {
    let services = Services::open(config_dir).await?;
    services.prepare_index(rebuild).await?;

    let chatbot = services.chatbot()?;
    if chatbot.is_none() {
        println!(
            "⚠️  {} is not set: /api/chatbot/query/ answers 503, other endpoints keep working",
            services.config.llm.api_key_env
        );
    }

    let state = AppState::new(
        chatbot,
        services.database.clone(),
        Arc::clone(&services.knowledge),
        &services.config.server,
    );

    println!("🌐 Serving on http://{}", services.config.server.bind);
    println!("Press Ctrl+C to stop the server");
    server::serve(&services.config.server.bind, state).await?;
    println!("✅ Shutdown complete");
    Ok(())
}

/// Rebuild and persist the index
#[inline]
pub async fn rebuild(config_dir: Option<&Path>) -> Result<()> {
    let services = Services::open(config_dir).await?;
    let report = rebuild_with_spinner(&services.knowledge).await?;
    print_report(&report);
    Ok(())
}

/// Show the state of every collaborator
#[inline]
pub async fn show_status(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("📊 Bakery Chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Database ({}):", config.database_path().display());
    match Database::connect(&config).await {
        Ok(database) => match database.ping().await {
            Ok(()) => match database.list_menu_items().await {
                Ok(items) => println!("   ✅ Connected, {} menu items", items.len()),
                Err(e) => println!("   ⚠️  Connected but the shop tables are unreadable - {e:#}"),
            },
            Err(e) => println!("   ❌ Not answering - {e:#}"),
        },
        Err(e) => println!("   ❌ Failed to connect - {e:#}"),
    }

    println!("🤖 Embeddings:");
    match config.embedding.provider {
        EmbeddingProvider::Ollama => match OllamaClient::new(&config.embedding) {
            Ok(client) => {
                let health = tokio::task::spawn_blocking(move || {
                    client.health_check().map_err(|e| format!("{e:#}"))
                })
                .await
                .unwrap_or_else(|e| Err(e.to_string()));
                match health {
                    Ok(()) => println!(
                        "   ✅ Ollama at {}:{} with model {}",
                        config.embedding.host, config.embedding.port, config.embedding.model
                    ),
                    Err(e) => println!("   ❌ Ollama unavailable - {e}"),
                }
            }
            Err(e) => println!("   ❌ Invalid Ollama settings - {e:#}"),
        },
        EmbeddingProvider::Hashing => println!(
            "   ✅ Offline hashing embedder ({} dimensions)",
            config.embedding.embedding_dimension
        ),
    }

    println!("🔍 Index ({}):", config.index_path().display());
    match persist::load(&config.index_path()) {
        Ok(Some(index)) => {
            let header = index.header();
            println!(
                "   ✅ {} documents, built {} with {}",
                header.document_count,
                header.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
                header.embedding_model
            );
            if let Some(Err(e)) = embeddings::from_config(&config)
                .ok()
                .map(|embedder| persist::validate_model(header, embedder.model_id()))
            {
                println!("   ❌ {e}");
            }
        }
        Ok(None) => println!("   💤 Not built yet"),
        Err(e) => println!("   ❌ Unreadable - {e}"),
    }

    println!("💬 LLM:");
    match config.llm_api_key() {
        Ok(_) => println!("   ✅ {} via {}", config.llm.model, config.llm.base_url),
        Err(e) => println!("   ⚠️  {e}"),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'bakery-chat init-db --sample-data' to create a demo shop database");
    println!("   • Use 'bakery-chat rebuild' to index the shop data");
    println!("   • Use 'bakery-chat serve' to start the chatbot API");

    Ok(())
}

/// Answer one question, or run a prompt loop when `question` is `None`
#[inline]
pub async fn ask(config_dir: Option<&Path>, question: Option<&str>) -> Result<()> {
    let services = Services::open(config_dir).await?;
    let chatbot = services.chatbot()?.with_context(|| {
        format!(
            "Set {} to ask questions from the terminal",
            services.config.llm.api_key_env
        )
    })?;
    services.prepare_index(false).await?;

    if let Some(question) = question {
        let answer = chatbot.ask(question, &[]).await?;
        print_answer(&answer);
        return Ok(());
    }

    println!("🥐 Bakery chatbot. Type 'refresh' to reload shop data, 'exit' to quit.");
    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut line = String::new();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;
        line.clear();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" | "q" => break,
            "refresh" => match rebuild_with_spinner(&services.knowledge).await {
                Ok(report) => print_report(&report),
                Err(e) => println!("❌ Refresh failed: {e}"),
            },
            _ => match chatbot.ask(input, &history).await {
                Ok(answer) => {
                    print_answer(&answer);
                    history.push(turn(TurnRole::User, input));
                    history.push(turn(TurnRole::Bot, &answer.text));
                    trim_history(&mut history, services.config.retrieval.history_turns);
                }
                Err(e) => println!("❌ {e}"),
            },
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

/// Keep only the most recent `keep` turns; older ones never reach the prompt
fn trim_history(history: &mut Vec<ConversationTurn>, keep: usize) {
    let excess = history.len().saturating_sub(keep);
    history.drain(..excess);
}

fn turn(role: TurnRole, text: &str) -> ConversationTurn {
    ConversationTurn {
        role,
        text: text.to_string(),
        timestamp: Some(chrono::Utc::now()),
    }
}

fn print_answer(answer: &Answer) {
    println!("\nBot: {}", answer.text);
    if !answer.suggestions.is_empty() {
        let links: Vec<String> = answer
            .suggestions
            .iter()
            .map(|s| format!("{} ({})", s.label, s.link))
            .collect();
        println!("     ↳ {}", links.join(" · "));
    }
}

/// Create the shop tables, optionally with demo data
#[inline]
pub async fn init_db(config_dir: Option<&Path>, sample_data: bool) -> Result<()> {
    let config = load_config(config_dir)?;
    let database = Database::connect(&config).await?;
    database.run_migrations().await?;
    println!("✅ Schema ready at {}", config.database_path().display());

    if sample_data {
        let created = database.seed_sample_data().await?;
        if created == 0 {
            println!("Menu already has items, sample data skipped");
        } else {
            println!("✅ Added {created} sample menu items, 2 orders and 1 payment");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_latest_turns() {
        let mut history: Vec<ConversationTurn> = (0..9)
            .map(|i| turn(TurnRole::User, &format!("question {i}")))
            .collect();

        trim_history(&mut history, 6);
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].text, "question 3");
        assert_eq!(history[5].text, "question 8");

        trim_history(&mut history, 10);
        assert_eq!(history.len(), 6);

        trim_history(&mut history, 0);
        assert!(history.is_empty());
    }
}
