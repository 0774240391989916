use anyhow::Context;
use tracing_subscriber::fmt::init;

use carbontrack_api::{
    config::Config,
    services::{progress_worker::ProgressWorker, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().context("Failed to load configuration")?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).context("Failed to create Redis client")?;

    let interval_secs = config.worker.progress_interval_secs;
    let app_state = AppState::new(config, mongo_client, redis_client)
        .await
        .context("Failed to initialize app state")?;

    let worker = ProgressWorker::new(app_state.challenges.clone(), interval_secs);

    worker.run().await?;

    Ok(())
}
