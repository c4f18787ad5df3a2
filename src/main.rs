use anyhow::{Context, Result};
use assistant_relay::{
    create_router, vector_store, AppState, Config, ConversationClient, OpenAIClient,
    SessionConfig,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "assistant-relay", about = "Chat relay for a hosted assistant with voice input")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/assistant-relay")]
    config: String,

    /// Do not attach the document vector store at startup
    #[arg(long)]
    skip_vector_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Assistant Relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let client: Arc<dyn ConversationClient> = Arc::new(OpenAIClient::new(&cfg.openai)?);

    let assistant = client
        .retrieve_assistant(&cfg.openai.assistant_id)
        .await
        .context("Failed to retrieve assistant")?;
    info!("Serving assistant '{}' ({})", assistant.name, assistant.id);

    let session_config = SessionConfig::from_config(&cfg, assistant.name.clone());

    if cli.skip_vector_store {
        info!("Vector store provisioning disabled");
    } else {
        vector_store::spawn_provisioning(
            Arc::clone(&client),
            assistant.id.clone(),
            cfg.vector_store,
        );
    }

    let app = create_router(AppState::new(client, session_config));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
