//! Service Registry client over Consul's plain HTTP API.
//!
//! No crate in the retrieved example pack wraps Consul; this is modeled on
//! `original_source/core/utils.py::ConsulClient`'s three operations
//! (`register_service`, `deregister_service`, `discover_service`, themselves
//! thin wrappers over python-consul's async HTTP calls), built on `reqwest`
//! which is already part of the shared client stack.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TaskforgeError, TaskforgeResult};
use crate::models::WorkerDescriptor;

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub http: String,
    pub interval: String,
    pub timeout: String,
}

impl HealthCheck {
    pub fn http_every_10s(url: impl Into<String>) -> Self {
        Self {
            http: url.into(),
            interval: "10s".into(),
            timeout: "5s".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RegisterServiceRequest {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Tags")]
    tags: Vec<String>,
    #[serde(rename = "Check")]
    check: ConsulCheck,
}

#[derive(Debug, Clone, Serialize)]
struct ConsulCheck {
    #[serde(rename = "HTTP")]
    http: String,
    #[serde(rename = "Interval")]
    interval: String,
    #[serde(rename = "Timeout")]
    timeout: String,
}

#[derive(Debug, Deserialize)]
struct HealthServiceEntry {
    #[serde(rename = "Service")]
    service: HealthServiceNode,
}

#[derive(Debug, Deserialize)]
struct HealthServiceNode {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
}

pub struct ServiceRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceRegistry {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builds"),
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub async fn register(
        &self,
        service_id: &str,
        name: &str,
        address: &str,
        port: u16,
        tags: Vec<String>,
        check: HealthCheck,
    ) -> TaskforgeResult<()> {
        let body = RegisterServiceRequest {
            id: service_id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            port,
            tags,
            check: ConsulCheck {
                http: check.http,
                interval: check.interval,
                timeout: check.timeout,
            },
        };
        let resp = self
            .http
            .put(format!("{}/v1/agent/service/register", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TaskforgeError::RegistryUnavailable(format!(
                "register failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn deregister(&self, service_id: &str) -> TaskforgeResult<()> {
        let resp = self
            .http
            .put(format!(
                "{}/v1/agent/service/deregister/{}",
                self.base_url, service_id
            ))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TaskforgeError::RegistryUnavailable(format!(
                "deregister failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Passing-health entries only, per spec.md §4.4.
    pub async fn discover(&self, name: &str) -> TaskforgeResult<Vec<WorkerDescriptor>> {
        let resp = self
            .http
            .get(format!(
                "{}/v1/health/service/{}?passing=true",
                self.base_url, name
            ))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TaskforgeError::RegistryUnavailable(format!(
                "discover failed: {}",
                resp.status()
            )));
        }
        let entries: Vec<HealthServiceEntry> = resp.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| WorkerDescriptor {
                service_id: e.service.id,
                address: e.service.address,
                port: e.service.port,
                supported_task_types: Vec::new(),
                busy: false,
                pending_count: 0,
            })
            .collect())
    }
}

/// Determine this process's externally-reachable address by opening a UDP
/// "connection" toward `(target_host, target_port)` — no packets are sent;
/// `connect` alone populates the socket's local address, which is the
/// outbound-facing interface address for that route. Falls back to
/// loopback if the lookup fails. Grounded on
/// `original_source/services/model_forwarder/main.py`'s lifespan
/// registration logic.
pub async fn discover_local_address(target_host: &str, target_port: u16) -> String {
    use tokio::net::UdpSocket;
    let result: std::io::Result<String> = async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((target_host, target_port)).await?;
        Ok(socket.local_addr()?.ip().to_string())
    }
    .await;
    result.unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_address_discovery_falls_back_to_loopback_on_bad_target() {
        // Port 0 as a target is invalid to connect to; exercise the fallback path.
        let addr = discover_local_address("0.0.0.0", 0).await;
        assert!(!addr.is_empty());
    }

    #[test]
    fn health_check_builder_sets_expected_intervals() {
        let check = HealthCheck::http_every_10s("http://localhost:8100/health");
        assert_eq!(check.interval, "10s");
        assert_eq!(check.timeout, "5s");
        assert_eq!(check.http, "http://localhost:8100/health");
    }
}
