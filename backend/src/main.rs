use anyhow::{Context, Result};
use backend::auth::{hash_password, TokenService};
use backend::config::{BootstrapArgs, Cli, Command, ServeArgs, TrainArgs};
use backend::db::{self, PgStore};
use backend::rest::{self, AppState};
use backend::scorer::AnomalyScorer;
use backend::{bootstrap, metrics, training};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Bootstrap(args) => run_bootstrap(args).await,
        Command::Train(args) => train(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    info!("Starting telemetry backend");
    info!("HTTP server: {}", args.http_addr);
    info!("Database: {}", db::redact_url(&args.database.database_url));

    metrics::init_metrics().context("Failed to register metrics")?;

    let pool = db::make_pool(&args.database.database_url, args.database.max_connections)
        .await
        .context("Failed to connect to database")?;

    // Hash of a random throwaway password; unknown usernames are verified against it
    let decoy_hash = hash_password(&hex::encode(rand::random::<[u8; 16]>()))
        .context("Failed to prepare login decoy hash")?;

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        scorer: Arc::new(AnomalyScorer::load_or_disabled(&args.model_path)),
        tokens: Arc::new(TokenService::new(
            args.jwt_secret.as_bytes(),
            chrono::Duration::minutes(args.token_ttl_minutes),
        )),
        decoy_hash: decoy_hash.into(),
    };

    let app = rest::create_router(state);

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.http_addr))?;

    info!("HTTP server listening on {}", args.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
            }
        })
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    Ok(())
}

async fn run_bootstrap(args: BootstrapArgs) -> Result<()> {
    info!("Database: {}", db::redact_url(&args.database.database_url));

    let pool = db::make_pool(&args.database.database_url, args.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await.context("Failed to apply migrations")?;

    let store = PgStore::new(pool);
    bootstrap::seed(&store, &args.seed_config(), hash_password)
        .await
        .context("Failed to seed admin user and device")?;

    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let artifact = training::train(&args.training_config()).context("Training failed")?;
    artifact
        .save(&args.output)
        .with_context(|| format!("Failed to write model to {}", args.output.display()))?;

    info!(
        "Model saved to {} (offset {:.4})",
        args.output.display(),
        artifact.forest.offset()
    );
    Ok(())
}
