//! Webhooker service.
//!
//! `webhooker listen` serves the webhook API over HTTPS; `webhooker
//! create-token` issues a bearer token and prints it once.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use webhooker_api::{
    config::ConfigOverrides, create_router_with_timeout, provision, serve_tls, shutdown_signal,
    tls, AppState, Config,
};
use webhooker_core::Storage;

/// Filter used when the configured directives do not parse.
const FALLBACK_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "webhooker", version, about = "Authenticated webhook receiver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /webhook and GET /wall over HTTPS.
    Listen(ListenCommand),
    /// Issue a new bearer token and print it to stdout.
    CreateToken(DatabaseArgs),
}

#[derive(Args, Debug)]
struct DatabaseArgs {
    /// PostgreSQL connection URI.
    #[arg(long)]
    dburi: Option<String>,
}

#[derive(Args, Debug)]
struct ListenCommand {
    /// Address to listen on, `host:port` or `:port`.
    #[arg(long)]
    listen_address: Option<String>,
    /// PEM certificate chain.
    #[arg(long)]
    certfile: Option<PathBuf>,
    /// PEM private key.
    #[arg(long)]
    keyfile: Option<PathBuf>,
    #[command(flatten)]
    database: DatabaseArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Listen(cmd) => ConfigOverrides {
            database_url: cmd.database.dburi.clone(),
            listen_address: cmd.listen_address.clone(),
            tls_cert_file: cmd.certfile.clone(),
            tls_key_file: cmd.keyfile.clone(),
        },
        Commands::CreateToken(args) => {
            ConfigOverrides { database_url: args.dburi.clone(), ..ConfigOverrides::default() }
        },
    };
    let config = Config::load(overrides)?;
    init_tracing(&config.rust_log);

    match cli.command {
        Commands::Listen(_) => listen(config).await,
        Commands::CreateToken(_) => create_token(config).await,
    }
}

/// Initializes tracing from the configured filter directives.
///
/// Logs go to stderr so stdout carries nothing but an issued token.
fn init_tracing(directives: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let (filter, rejected) = match EnvFilter::try_new(directives) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_LOG_FILTER), Some(e)),
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    if let Some(e) = rejected {
        warn!(directives, error = %e, fallback = FALLBACK_LOG_FILTER, "invalid log filter");
    }
}

async fn listen(config: Config) -> Result<()> {
    let addr = config.parse_listen_addr()?;
    info!(
        database_url = %config.database_url_masked(),
        listen_address = %addr,
        max_body_bytes = config.max_body_bytes,
        wall_requires_token = config.wall_requires_token,
        "Configuration loaded"
    );

    let (cert_path, key_path) = config.tls_paths()?;
    let tls_config =
        tls::load_server_config(cert_path, key_path).context("Failed to load TLS configuration")?;

    let storage = connect_storage(&config).await?;

    let state = AppState::from_storage(&storage)
        .with_max_body_bytes(config.max_body_bytes)
        .with_wall_auth(config.wall_requires_token);
    let app = create_router_with_timeout(state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let served = serve_tls(listener, tls_config, app, shutdown_signal()).await;

    storage.close().await;
    info!("Database connections closed");

    served.context("Server failed")
}

async fn create_token(config: Config) -> Result<()> {
    let storage = connect_storage(&config).await?;

    let issued = provision::issue_token(storage.tokens.as_ref()).await;
    let total = storage.tokens.count().await;
    storage.close().await;

    let issued = issued.context("Failed to store the new token")?;
    if let Ok(total) = total {
        info!(total_tokens = total, "Token stored");
    }

    println!("{}", issued.token);
    Ok(())
}

/// Connects to PostgreSQL and makes sure the schema exists.
async fn connect_storage(config: &Config) -> Result<Storage> {
    let pool = create_database_pool(config).await?;
    let storage = Storage::new(pool);
    storage.ensure_schema().await.context("Failed to create database schema")?;
    info!("Database schema ready");
    Ok(storage)
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);
    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
