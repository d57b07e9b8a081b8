//! Knowledge search port.
//!
//! The retrieval pipeline is an external collaborator; the knowledge-base
//! tool only needs ranked passages for a query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeSearchError {
    #[error("Knowledge index unavailable: {0}")]
    Unavailable(String),

    #[error("Search failed: {0}")]
    Failed(String),
}

/// A scored passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    /// Where the passage came from (document title or id)
    pub source: String,
    pub content: String,
    /// Relevance in `[0, 1]`, higher is better
    pub score: f64,
}

#[async_trait]
pub trait KnowledgeSearchPort: Send + Sync {
    /// Search the user's knowledge base, best hits first.
    async fn search(
        &self,
        query: &str,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeSearchError>;
}
