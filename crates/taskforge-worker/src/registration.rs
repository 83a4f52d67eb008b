//! Consul registration/deregistration, grounded on
//! `original_source/services/model_forwarder/main.py`'s lifespan block.

use taskforge_shared::clients::sr::{discover_local_address, HealthCheck, ServiceRegistry};
use taskforge_shared::config::TaskforgeConfig;
use taskforge_shared::error::TaskforgeResult;

pub const SERVICE_NAME: &str = "model-forwarder";

pub async fn register(
    registry: &ServiceRegistry,
    config: &TaskforgeConfig,
) -> TaskforgeResult<String> {
    let address = if config.worker.service_host == "0.0.0.0" {
        discover_local_address(&config.consul.host, config.consul.port).await
    } else {
        config.worker.service_host.clone()
    };

    let health_url = format!("http://{address}:{}/health", config.worker.service_port);
    registry
        .register(
            &config.worker.instance_id,
            SERVICE_NAME,
            &address,
            config.worker.service_port,
            vec!["model".to_string(), "inference".to_string()],
            HealthCheck::http_every_10s(health_url),
        )
        .await?;
    Ok(address)
}

pub async fn deregister(registry: &ServiceRegistry, config: &TaskforgeConfig) -> TaskforgeResult<()> {
    registry.deregister(&config.worker.instance_id).await
}
