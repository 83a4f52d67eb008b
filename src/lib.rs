//! Workspace root for the taskforge platform.
//!
//! The actual services live in the `taskforge-*` member crates; this crate
//! carries no library code of its own and exists so the workspace has a
//! single place for cross-cutting dev-dependencies and end-to-end tests.
