use agent_service::config::AgentConfig;
use agent_service::services::metrics::init_metrics;
use agent_service::startup::Application;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = AgentConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "agent-service",
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    tracing::info!(environment = %config.environment, debug = config.debug, "Starting agent-service");

    init_metrics().map_err(|e| {
        tracing::error!("Failed to install metrics recorder: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;
    let cache = app.state().cache.clone();

    app.run_until(shutdown_signal()).await?;

    if let Err(e) = cache.close().await {
        tracing::warn!("Failed to close cache connection: {}", e);
    }
    tracing::info!("agent-service stopped");
    Ok(())
}
