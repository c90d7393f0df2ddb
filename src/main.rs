//! Risk matrix service binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use risk_matrix::config::{AuthConfig, Config};
use risk_matrix::db::connect_from_config;
use risk_matrix::web::{
    AuthState, BearerTokenVerifier, GatewayState, RemoteSessionVerifier, SessionVerifier,
    start_server,
};

#[derive(Parser)]
#[command(name = "risk-matrix", version)]
#[command(about = "Risk matrix template service")]
struct Cli {
    /// Extra env file to load before resolving configuration
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log output format: `text` or `json` (falls back to LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve {
        /// Address to bind (overrides GATEWAY_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides GATEWAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply schema migrations and exit
    Migrate,
}

/// Load the explicit env file first, then `.env`. dotenvy never overrides a
/// variable that is already set, so the explicit file wins over `.env` and the
/// process environment wins over both.
fn load_env(explicit: Option<&Path>) -> Result<()> {
    if let Some(path) = explicit {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load env file {}", path.display()))?;
    }
    dotenvy::dotenv().ok();
    Ok(())
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "risk_matrix=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_verifier(auth: &AuthConfig) -> Result<Arc<dyn SessionVerifier>> {
    Ok(match auth {
        AuthConfig::Token { token, user_id } => {
            Arc::new(BearerTokenVerifier::new(token.clone(), user_id.clone()))
        }
        AuthConfig::Remote { session_url } => Arc::new(RemoteSessionVerifier::new(
            session_url.clone(),
        )?),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env(cli.env_file.as_deref())?;

    let log_format = cli
        .log_format
        .or_else(|| std::env::var("LOG_FORMAT").ok())
        .unwrap_or_else(|| "text".to_string());
    init_tracing(&log_format);

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => serve(host, port).await,
        Commands::Migrate => migrate().await,
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let store = connect_from_config(&config.database).await?;
    tracing::info!(
        backend = config.database.backend.as_str(),
        "database ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;

    let auth_state = AuthState {
        verifier: build_verifier(&config.gateway.auth)?,
    };
    let state = Arc::new(GatewayState::new(store));
    let bound = start_server(
        addr,
        state.clone(),
        auth_state,
        &config.gateway.cors_origins,
    )
    .await?;
    tracing::info!(
        %bound,
        auth_mode = config.gateway.auth.mode(),
        "risk matrix service started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    state.shutdown().await;
    Ok(())
}

async fn migrate() -> Result<()> {
    let config = Config::database_from_env()?;
    connect_from_config(&config).await?;
    tracing::info!(backend = config.backend.as_str(), "migrations applied");
    Ok(())
}
