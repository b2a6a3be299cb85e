//! Notifier entry point.

use notifier::{Config, LogFormat, NotifierError};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() -> Result<(), NotifierError> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("received SIGINT, starting graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM, starting graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        tracing::info!("received SIGINT, starting graceful shutdown");
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), NotifierError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()
        .map_err(|e| NotifierError::Metrics(e.to_string()))?;
    tracing::info!(addr = %config.metrics_addr, "metrics listener started");

    // 3. Connect and prepare the schema
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let reactor = notifier::build_reactor(&pool, &config).await?;

    // 4. Stop between events on SIGINT/SIGTERM
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!(error = %e, "signal handler failed, shutting down");
        }
        let _ = stop_tx.send(true);
    });

    // 5. Run until stopped
    let result = reactor.run(stop_rx).await;
    pool.close().await;

    match result {
        Ok(()) => {
            tracing::info!("notifier shut down gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "reactor halted");
            Err(e.into())
        }
    }
}
