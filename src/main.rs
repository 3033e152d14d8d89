//! Krishi AI CLI - main entry point
//!
//! Interactive agricultural Q&A backed by a Neo4j knowledge graph,
//! Ollama embeddings and a Groq-hosted language model.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use krishi_ai::{
    chatbot, metrics, Config, GraphStore, GroqClient, OllamaClient, Orchestrator,
    SimilarityFunction,
};

#[derive(Parser)]
#[command(name = "krishi_ai")]
#[command(about = "Agricultural Q&A chatbot over a knowledge graph", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML config file (krishi.yml is used when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Groq model to answer with
    #[arg(long, global = true)]
    model: Option<String>,

    /// Ollama embedding model (must match the stored entity embeddings)
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Cypher cosine function: gds (GDS plugin) or native (Neo4j 5.18+)
    #[arg(long, value_enum, global = true)]
    similarity: Option<SimilarityFunction>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Answer one question and exit
    Ask {
        /// The question; quoting is optional
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Check that Ollama and Neo4j are reachable and configured
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loads .env as well, so RUST_LOG from there applies below
    let mut config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("krishi_ai=warn")),
        )
        .init();

    if let Some(model) = cli.model {
        config.groq_model = model;
    }
    if let Some(model) = cli.embedding_model {
        config.embedding_model = model;
    }
    if let Some(similarity) = cli.similarity {
        config.similarity = similarity;
    }

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let orchestrator = build_orchestrator(&config).await?;
            println!("✅ Using Ollama embeddings: {}", config.embedding_model);

            let stdin = BufReader::new(tokio::io::stdin());
            chatbot::run(&orchestrator, stdin, &mut io::stdout()).await?;
        }
        Commands::Ask { question } => {
            let orchestrator = build_orchestrator(&config).await?;
            chatbot::answer_once(&orchestrator, &question.join(" "), &mut io::stdout()).await?;
        }
        Commands::Check => run_check(&config).await?,
    }

    Ok(())
}

/// Create the long-lived service handles. A missing API key fails before any
/// connection is attempted.
async fn build_orchestrator(
    config: &Config,
) -> anyhow::Result<Orchestrator<OllamaClient, GraphStore, GroqClient>> {
    let model = GroqClient::new(config.require_groq_api_key()?)?
        .with_model(&config.groq_model)
        .with_base_url(&config.groq_base_url);

    let embedder = OllamaClient::with_url(&config.ollama_url, &config.embedding_model)?;

    let graph = GraphStore::connect(
        &config.neo4j_uri,
        &config.neo4j_user,
        &config.neo4j_password,
        config.similarity,
    )
    .await?;

    Ok(Orchestrator::new(embedder, graph, model))
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let mut healthy = true;

    let embedder = OllamaClient::with_url(&config.ollama_url, &config.embedding_model)?;
    if !embedder.is_running().await {
        healthy = false;
        println!("❌ Ollama: not reachable at {}", config.ollama_url);
    } else {
        match embedder.has_model().await {
            Ok(true) => println!("✅ Ollama: {} available", embedder.model()),
            Ok(false) => {
                healthy = false;
                println!(
                    "❌ Ollama: model {} not pulled (run `ollama pull {}`)",
                    embedder.model(),
                    embedder.model()
                );
            }
            Err(err) => {
                healthy = false;
                println!("❌ Ollama: {}", err);
            }
        }
    }

    let graph_status: krishi_ai::Result<i64> = async {
        let store = GraphStore::connect(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
            config.similarity,
        )
        .await?;
        store.ping().await?;
        store.entity_count().await
    }
    .await;

    match graph_status {
        Ok(0) => println!(
            "⚠️ Neo4j: connected to {}, but no :Entity nodes carry an embedding",
            config.neo4j_uri
        ),
        Ok(count) => println!(
            "✅ Neo4j: {} entities with embeddings at {}",
            count, config.neo4j_uri
        ),
        Err(err) => {
            healthy = false;
            println!("❌ Neo4j: {}", err);
        }
    }

    match config.require_groq_api_key() {
        Ok(_) => println!("✅ Groq: API key configured, model {}", config.groq_model),
        Err(err) => println!("⚠️ Groq: {} (chat and ask will refuse to start)", err),
    }

    if !healthy {
        anyhow::bail!("one or more services are not ready");
    }
    Ok(())
}
