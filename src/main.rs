//! minutes-mcp: MCP server on stdin/stdout.
//!
//! Logs go to stderr; stdout carries protocol frames only.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

use minutes_mcp::auth::PendingAuthStore;
use minutes_mcp::client::HttpApiClient;
use minutes_mcp::mcp::{McpRouter, StdioServer};
use minutes_mcp::tools::{default_registry, Dispatcher, ToolContext};
use minutes_mcp::Config;

#[derive(Debug, Parser)]
#[command(name = "minutes-mcp", version, about = "Minutes shopping tools over MCP (stdio)")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long, env = "MINUTES_API_URL")]
    api_url: Option<String>,

    /// JSON config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log format: "json" or "compact"
    #[arg(long, env = "MINUTES_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    if let Some(format) = cli.log_format {
        config.observability.json_logs = format.eq_ignore_ascii_case("json");
    }
    config.validate()?;

    minutes_mcp::observability::init_tracing(&config.observability);

    let client = Arc::new(HttpApiClient::new(&config.api)?);
    let pending = Arc::new(PendingAuthStore::new(config.auth.pending_ttl));
    let ctx = ToolContext::new(client, pending.clone(), config.tools.clone());

    let registry = default_registry()?;
    tracing::info!(
        tools = registry.len(),
        api_url = %config.api.base_url,
        "minutes_mcp_starting"
    );

    let router = McpRouter::new(Dispatcher::new(registry, ctx), config.server.clone());
    let server = StdioServer::new(router, config.transport.clone());
    let cancel = server.cancellation_token();

    let sweeper = PendingAuthStore::spawn_sweeper(pending, config.auth.sweep_interval, cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown_signal_received");
            shutdown.cancel();
        }
    });

    let result = server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    cancel.cancel();
    let _ = sweeper.await;
    tracing::info!("minutes_mcp_stopped");
    result?;
    Ok(())
}
