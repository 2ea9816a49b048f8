use anyhow::Context;
use futures_ledger::{api, config::Config, replay, PositionController};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let mut controller = PositionController::new();
    if let Some(currency) = &config.collateral_currency {
        controller = controller.with_collateral_currency(currency.clone());
    }
    let controller = Arc::new(controller);

    if let Some(path) = &config.fills_replay_path {
        let summary = replay::replay_file(&controller, path)
            .with_context(|| format!("failed to replay fills from {}", path))?;
        tracing::info!(
            tracked = summary.tracked,
            rejected = summary.rejected,
            keys = summary.keys,
            "Loaded fills"
        );
    }

    let app = api::create_router(api::AppState::new(controller, config));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
