//! Shared application state for the worker's HTTP surface.

use std::sync::Arc;

use taskforge_shared::clients::tq::LogBusClient;
use taskforge_shared::config::TaskforgeConfig;

use crate::runtime::WorkerRuntime;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TaskforgeConfig>,
    pub log_bus: Arc<LogBusClient>,
    pub runtime: Arc<WorkerRuntime>,
}
