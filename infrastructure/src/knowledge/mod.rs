//! Knowledge search adapters.

pub mod in_memory;

pub use in_memory::{InMemoryKnowledgeIndex, KnowledgeDocument, KnowledgeLoadError};
