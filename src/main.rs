use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mission_deck::api::{self, AppState, SecurityConfig};
use mission_deck::config::{parse_gateway_url, Config, DEFAULT_PORT};
use mission_deck::gateway::GatewayClient;
use mission_deck::{state, tail};
use mission_deck_core::{EventExtractor, LogCursor, MissionDeck};

#[derive(Parser)]
#[command(name = "deck")]
#[command(about = "Live mission view over an agent gateway's operational log")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the gateway log and serve the mission view
    Serve {
        /// Port for HTTP API and observer WebSocket
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the gateway's daily log files
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Gateway control channel URL (ws:// or wss://)
        #[arg(long)]
        gateway_url: Option<String>,
    },
    /// Print the events extracted from a log file as JSON lines
    Extract {
        file: PathBuf,
    },
    /// Check whether a deck server is running
    Status {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

/// Initialize tracing with output to stderr (for extract mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(
        |_| "mission_deck=debug,mission_deck_core=info,tower_http=info".into(),
    ));

    if use_stderr {
        // Extract mode prints events on stdout
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Some(Commands::Extract { .. }));
    init_tracing(use_stderr);

    match cli.command {
        Some(Commands::Serve {
            port,
            log_dir,
            gateway_url,
        }) => serve(port, log_dir, gateway_url).await?,
        Some(Commands::Extract { file }) => extract(&file)?,
        Some(Commands::Status { port }) => status(port).await?,
        None => serve(None, None, None).await?,
    }

    Ok(())
}

async fn serve(
    port: Option<u16>,
    log_dir: Option<PathBuf>,
    gateway_url: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = log_dir {
        config.tail.dir = dir;
    }
    if let Some(url) = gateway_url {
        config.gateway.url = parse_gateway_url(&url)?;
    }

    tracing::info!(agents = ?config.roster.agents(), "starting mission deck");

    let (state, actor) = state::spawn(MissionDeck::new(config.roster.clone()));
    let gateway = GatewayClient::new(config.gateway.clone());
    let gateway_task = gateway.spawn(state.clone());
    let tailer = tail::spawn_tailer(config.tail.clone(), state.clone());

    let app = api::create_router_with_config(
        AppState::new(state, gateway.clone()),
        SecurityConfig::from_env(),
    );

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.port)).await?;
    tracing::info!("mission deck listening on http://127.0.0.1:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("shutting down");
    tailer.abort();
    gateway.shutdown();
    let _ = gateway_task.await;
    actor.abort();
    Ok(())
}

fn extract(file: &std::path::Path) -> anyhow::Result<()> {
    let roster = std::env::var("DECK_AGENTS")
        .map(|list| mission_deck_core::Roster::parse(&list))
        .unwrap_or_default();
    let extractor = EventExtractor::new(roster);

    let mut cursor = LogCursor::new(file.to_path_buf());
    let mut lines = cursor.ingest(&std::fs::read(file)?);
    lines.extend(cursor.flush());

    let mut matched = 0usize;
    for line in &lines {
        if let Some(extraction) = extractor.classify(line) {
            matched += 1;
            let record = serde_json::json!({
                "rule": extraction.rule,
                "subsystem": extraction.subsystem,
                "event": extraction.event,
            });
            println!("{record}");
        }
    }
    tracing::info!(file = %file.display(), lines = lines.len(), matched, "extraction finished");
    Ok(())
}

async fn status(port: u16) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{port}/api/v1/health");
    match reqwest::get(&url).await {
        Ok(response) if response.status().is_success() => {
            let body: serde_json::Value = response.json().await?;
            let connected = body["gateway"]["connected"].as_bool().unwrap_or(false);
            println!("mission deck is running on port {port}");
            println!(
                "gateway: {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
        Ok(response) => {
            println!("mission deck on port {port} answered {}", response.status());
        }
        Err(_) => {
            println!("mission deck is not running on port {port}");
        }
    }
    Ok(())
}
