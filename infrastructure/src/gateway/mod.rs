//! Model gateway adapters.

pub mod openai_compatible;

pub use openai_compatible::{GatewaySettings, OpenAiCompatibleGateway};
