//! Multi-provider image generation orchestrator
//!
//! Fronts several text-to-image vendors behind one capability contract, with
//! priority-ordered fallback, concurrent alternatives, running cost tracking,
//! and a named-operation dispatcher for tool callers.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod response;

pub use error::{AppError, Result};

use std::sync::Arc;

use dispatch::Dispatcher;
use orchestrator::Orchestrator;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(settings: config::Settings, orchestrator: Orchestrator) -> Self {
        let orchestrator = Arc::new(orchestrator);
        Self {
            settings: Arc::new(settings),
            dispatcher: Dispatcher::new(orchestrator.clone()),
            orchestrator,
        }
    }
}
