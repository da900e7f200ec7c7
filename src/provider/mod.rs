//! Provider module - capability contract, vendor clients, and registry

pub mod credentials;
pub mod dalle;
pub mod gpt_image;
pub mod http;
pub mod imagen;
pub mod nano_banana;
pub mod registry;
pub mod traits;

pub use registry::ProviderRegistry;
pub use traits::{
    ConversationHandle, ConversationOptions, ConversationalProvider, GenerationParams,
    ImageProvider, ProviderKind, ProviderOutput,
};
