use std::{env, error::Error};

use review_engine::ConfigSnapshot;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file when present.
    // Containerized deployments pass real env vars instead.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,review_engine=debug"))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // The snapshot is immutable for the process lifetime; an invalid file
    // must stop the service before the listener binds.
    let config_path = env::var("REVIEW_GATE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let snapshot = ConfigSnapshot::load(&config_path)?;

    info!(
        path = %config_path,
        model = %snapshot.llm.model,
        threshold = snapshot.review.quality_threshold,
        workers = snapshot.runtime.max_workers,
        "configuration snapshot loaded"
    );

    api::start(snapshot).await?;

    Ok(())
}
