use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docketcc_api::{router, ticker::start_ticker, AppState};
use docketcc_common::Config;
use docketcc_pipeline::{Pipeline, PipelineDeps};
use docketcc_store::{connect, migrate};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docketcc=info".parse()?))
        .json()
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = connect(&config.database_url).await?;
    migrate(&pool).await?;

    let pipeline = Pipeline::new(PipelineDeps::from_config(pool, &config));
    let state = Arc::new(AppState::new(pipeline, config.admin_token.clone()));

    if state.admin_token.is_none() {
        info!("No ADMIN_TOKEN set, admin routes will refuse every request");
    }
    if let Some(minutes) = config.tick_minutes {
        start_ticker(state.clone(), minutes);
    }

    let app = router(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("DocketCC API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
