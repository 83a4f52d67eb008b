//! Thin wrapper binary for running the dispatcher standalone. No HTTP
//! listener of its own; it only drains the task queue.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use taskforge_dispatcher::Dispatcher;
use taskforge_shared::clients::sr::ServiceRegistry;
use taskforge_shared::clients::tq::MessageBroker;
use taskforge_shared::clients::tss::TaskStateStore;
use taskforge_shared::config::TaskforgeConfig;
use taskforge_shared::logging;

/// How long the shutdown handler waits for an in-flight dispatch to
/// finish before the process exits, mirroring the source's bounded drain
/// wait in `TaskScheduler.stop()`.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting taskforge dispatcher...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TaskforgeConfig::load()?;

    let tss = TaskStateStore::connect(&format!(
        "redis://{}:{}/{}",
        config.redis.host, config.redis.port, config.redis.db
    ))
    .await?;

    let broker = MessageBroker::connect(&config.rabbitmq.amqp_url()).await?;
    let tq = broker.task_queue().await?;

    let registry = ServiceRegistry::new(&config.consul.host, config.consul.port);

    let dispatcher = Dispatcher::new(config.dispatcher.clone(), registry, tss);
    let shutting_down = dispatcher.shutdown_flag();

    tokio::select! {
        result = dispatcher.run(&tq) => {
            if let Err(e) = result {
                error!(error = %e, "dispatcher consume loop ended with error");
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown requested, draining in-flight dispatch work");
            shutting_down.store(true, Ordering::SeqCst);
            tokio::time::sleep(SHUTDOWN_DRAIN).await;
        }
    }

    info!("dispatcher stopped");
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
