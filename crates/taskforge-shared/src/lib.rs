//! Shared data plane for the taskforge platform.
//!
//! Carries the wire/state types (`models`), the closed error taxonomy
//! (`error`), configuration loading (`config`), logging setup (`logging`),
//! the payload normalization visitor (`value`), the shared retry helper
//! (`retry`), a circuit breaker (`resilience`), and the client adapters for
//! the Task State Store, Task Queue, Log Bus, Service Registry, and Object
//! Store (`clients`).

pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod resilience;
pub mod retry;
pub mod value;

pub use error::{TaskforgeError, TaskforgeResult};
