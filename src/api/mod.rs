//! HTTP surface over the orchestrator and dispatcher

pub mod handlers;
pub mod routes;
