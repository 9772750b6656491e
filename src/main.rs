use health_plan_search::{
    api::{build_router, AppState},
    config::Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "health_plan_search={},tower_http=info",
                    config.observability.log_level
                )
                .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(
        service = %config.observability.service_name,
        "Starting Health Plan Search v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        endpoint = %config.elasticsearch.endpoint,
        index = %config.elasticsearch.indices.health_plans,
        "Search backend configured"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = health_plan_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);

    // Wire services around one shared backend client
    let app_state = AppState::from_config(config)?;
    tracing::info!("✅ Search, QA and summary services initialized");

    let app = build_router(app_state);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/api/health", http_addr);
    tracing::info!("   Search API: http://{}/api/search", http_addr);
    tracing::info!("   QA validation: http://{}/api/qa/validate", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
