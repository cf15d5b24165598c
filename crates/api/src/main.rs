//! API server entry point.

use api::config::Config;
use saga::run_consumer;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the storefront: command service, broker, saga consumer
    let storefront = api::build_storefront().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay_task = {
        let relay = storefront.relay.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { relay.run(shutdown_rx).await })
    };

    let consumer_task = {
        let conn = storefront.consumer_conn.clone();
        let consumer = storefront.consumer;
        tokio::spawn(async move { run_consumer(conn, consumer, shutdown_rx).await })
    };

    // 4. Build the application and start the server
    let app = api::create_app(storefront.state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 5. Stop the relay and consumer, then release the broker connection
    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_task.await {
        tracing::error!(error = %e, "relay task panicked");
    }
    match consumer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "consumer stopped with error"),
        Err(e) => tracing::error!(error = %e, "consumer task panicked"),
    }
    if let Err(e) = storefront.publisher_conn.close().await {
        tracing::error!(error = %e, "error closing broker connection");
    }

    tracing::info!("server shut down gracefully");
}
