use sfunet_api::{build_router, state::AppState};
use sfunet_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sfunet_api=debug,sfunet_services=debug,sfunet_media=debug,tower_http=debug".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!(host = %settings.server.host, port = settings.server.port, "starting sfunet control plane");

    let app_state = match AppState::new(settings.clone()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize media engine workers");
            std::process::exit(2);
        }
    };

    let app = build_router(app_state.clone());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received, draining");
        app_state.shutdown();
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
