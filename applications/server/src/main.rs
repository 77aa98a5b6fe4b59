/// FlashTune backend - search, playlist listing and MP3 downloads
use clap::{Parser, Subcommand};
use flashtune_server::{config::ServerConfig, create_router, state::AppState};
use std::{net::SocketAddr, path::PathBuf, process::Stdio};
use tokio::process::Command;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flashtune-server")]
#[command(about = "FlashTune download backend", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check that the extractor and transcoder can be started
    CheckTools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashtune_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            serve(config).await?;
        }
        Commands::CheckTools => {
            config.validate()?;
            check_tools(&config).await?;
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("Starting FlashTune server");
    tracing::info!("Extractor: {}", config.extractor.program);
    tracing::info!("Transcoder: {}", config.transcoder.program);
    if config.auth.api_keys.is_empty() {
        tracing::warn!("No API keys configured, all routes are public");
    }

    let app = create_router(AppState::from_config(&config));

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn check_tools(config: &ServerConfig) -> anyhow::Result<()> {
    let tools = [
        ("extractor", config.extractor.program.as_str(), "--version"),
        ("transcoder", config.transcoder.program.as_str(), "-version"),
    ];

    let mut missing = 0;
    for (role, program, flag) in tools {
        let output = Command::new(program)
            .arg(flag)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let version = stdout.lines().next().unwrap_or("").trim();
                println!("✓ {} ({}): {}", role, program, version);
            }
            Ok(output) => {
                missing += 1;
                println!("✗ {} ({}) exited with {}", role, program, output.status);
            }
            Err(e) => {
                missing += 1;
                println!("✗ {} ({}): {}", role, program, e);
            }
        }
    }

    if missing > 0 {
        anyhow::bail!("{} tool(s) unavailable", missing);
    }
    Ok(())
}
