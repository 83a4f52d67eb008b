//! Shared application state, built once in `bin/server.rs` and cloned
//! (cheaply — everything here is an `Arc` or already `Clone`) into every
//! request handler.

use std::sync::Arc;

use taskforge_shared::clients::os::ObjectStore;
use taskforge_shared::clients::tq::{LogBusClient, TaskQueueClient};
use taskforge_shared::clients::tss::TaskStateStore;
use taskforge_shared::config::TaskforgeConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TaskforgeConfig>,
    pub tss: TaskStateStore,
    pub tq: Arc<TaskQueueClient>,
    pub log_bus: Arc<LogBusClient>,
    pub object_store: Arc<ObjectStore>,
}
