//! Headless MCP stdio server exposing the recall memory tools.
//!
//! ```bash
//! OPENAI_API_KEY=sk-... recall --db recall.db --user-id alice
//! ```

mod tools;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use recall_core::llm::tool::Tools;
use recall_memory::MemoryClient;
use recall_mcp::McpServer;
use recall_openai::OpenAI;
use recall_sqlite::SqliteVectorStore;
use tools::{AddTool, ClearTool, DeleteTool, GetTool, ListTool, QueryTool, ToolContext, UpdateTool};
use tracing_subscriber::EnvFilter;

const SERVER_NAME: &str = "recall";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_MODEL: &str = "gpt-5-nano";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DB: &str = "recall.db";

/// An MCP stdio server that exposes long-term memory tools backed by an
/// OpenAI-compatible model and a SQLite store.
#[derive(Debug, Parser)]
#[command(name = "recall", version)]
struct Cli {
    /// SQLite database path, or `:memory:` for an ephemeral store.
    #[arg(long, env = "RECALL_DB", default_value = DEFAULT_DB)]
    db: String,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// Chat model used for fact extraction and consolidation.
    #[arg(long, env = "RECALL_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Embedding model used for memory vectors.
    #[arg(long, env = "RECALL_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding: String,

    /// Default tenant used when a tool call omits `userId`.
    #[arg(long, env = "RECALL_USER_ID")]
    user_id: Option<String>,

    /// Enable debug logging on stderr.
    #[arg(long, env = "RECALL_VERBOSE")]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_tools(client: Arc<MemoryClient<OpenAI, OpenAI, SqliteVectorStore>>, default_user_id: Option<String>) -> Tools {
    let ctx = ToolContext { client, default_user_id };
    let mut tools = Tools::new();
    tools.register(AddTool(ctx.clone()));
    tools.register(QueryTool(ctx.clone()));
    tools.register(ListTool(ctx.clone()));
    tools.register(GetTool(ctx.clone()));
    tools.register(UpdateTool(ctx.clone()));
    tools.register(DeleteTool(ctx.clone()));
    tools.register(ClearTool(ctx));
    tools
}

async fn run(cli: Cli) -> Result<()> {
    if cli.openai_key.trim().is_empty() {
        bail!("OPENAI_API_KEY is required");
    }

    let llm = OpenAI::new(cli.openai_key)
        .with_model(cli.model)
        .with_embedding_model(cli.embedding);
    let embedder = llm.clone();

    let store = SqliteVectorStore::connect(&cli.db)
        .await
        .with_context(|| format!("failed to open database at {}", cli.db))?;

    let client = Arc::new(MemoryClient::new(llm, embedder, store));
    let tools = build_tools(client, cli.user_id);

    let mut server = McpServer::stdio(tools, SERVER_NAME, SERVER_VERSION)
        .context("failed to initialize MCP stdio transport")?;

    tokio::select! {
        result = server.run() => result.context("MCP server loop failed"),
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received, exiting");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    match runtime.block_on(run(cli)) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    }
}
