//! Thin wrapper binary for running the ICC service standalone, following
//! the bootstrap/shutdown shape of the teacher's `tasker-orchestration`
//! server binary.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use taskforge_icc::state::AppState;
use taskforge_shared::clients::os::ObjectStore;
use taskforge_shared::clients::tq::MessageBroker;
use taskforge_shared::clients::tss::TaskStateStore;
use taskforge_shared::config::TaskforgeConfig;
use taskforge_shared::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting taskforge ICC...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TaskforgeConfig::load()?;
    let config = Arc::new(config);

    let tss = TaskStateStore::connect(&format!(
        "redis://{}:{}/{}",
        config.redis.host, config.redis.port, config.redis.db
    ))
    .await?;

    let broker = MessageBroker::connect(&config.rabbitmq.amqp_url()).await?;
    let tq = Arc::new(broker.task_queue().await?);
    let log_bus = Arc::new(broker.log_bus().await?);

    let object_store = Arc::new(
        ObjectStore::connect(
            &config.minio.endpoint,
            "us-east-1",
            &config.minio.access_key,
            &config.minio.secret_key,
            &config.minio.bucket_inputs,
        )
        .await?,
    );

    let state = AppState {
        config: config.clone(),
        tss,
        tq,
        log_bus,
        object_store,
    };

    let app = taskforge_icc::build_router(state);
    let addr = format!("{}:{}", config.icc.host, config.icc.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "ICC listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "ICC server error");
    }
    info!("ICC server stopped");

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
