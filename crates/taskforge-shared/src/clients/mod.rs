//! Client adapters for the four supporting infra contracts named in
//! spec.md §4.4: Task State Store, Task Queue + Log Bus, Service Registry,
//! and Object Store.

pub mod os;
pub mod sr;
pub mod tq;
pub mod tss;
