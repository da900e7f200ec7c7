//! Orchestrator module - fallback generation, fan-out, and cost tracking

pub mod engine;
pub mod models;

pub use engine::Orchestrator;
pub use models::{round_usd, AlternativesBundle, GeneratedImage, GenerationResult, NO_PROVIDER};
