//! Worker Runtime bootstrap: connect the log bus, register with the
//! Service Registry, serve the HTTP surface, and on shutdown drain the
//! in-flight task (up to 10s) before deregistering.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use taskforge_shared::clients::sr::ServiceRegistry;
use taskforge_shared::clients::tq::MessageBroker;
use taskforge_shared::config::TaskforgeConfig;
use taskforge_shared::logging;
use taskforge_worker::registry::build_registry;
use taskforge_worker::runtime::WorkerRuntime;
use taskforge_worker::state::AppState;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting taskforge worker...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TaskforgeConfig::load()?;
    let config = Arc::new(config);

    let broker = MessageBroker::connect(&config.rabbitmq.amqp_url()).await?;
    let log_bus = Arc::new(broker.log_bus().await?);

    let registry = build_registry();
    let runtime = WorkerRuntime::start(registry, log_bus.clone(), config.worker.instance_id.clone());

    let service_registry = ServiceRegistry::new(&config.consul.host, config.consul.port);
    let registered_address = taskforge_worker::registration::register(&service_registry, &config).await?;
    info!(
        instance_id = %config.worker.instance_id,
        address = %registered_address,
        "registered with service registry",
    );

    let state = AppState {
        config: config.clone(),
        log_bus,
        runtime: runtime.clone(),
    };

    let app = taskforge_worker::build_router(state);
    let addr = format!("{}:{}", config.worker.service_host, config.worker.service_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "worker listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "worker server error");
    }

    info!("shutting down, rejecting new tasks");
    runtime.begin_shutdown();
    runtime.wait_for_drain(SHUTDOWN_DRAIN).await;

    if let Err(e) = taskforge_worker::registration::deregister(&service_registry, &config).await {
        error!(error = %e, "failed to deregister from service registry");
    }

    info!("worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
