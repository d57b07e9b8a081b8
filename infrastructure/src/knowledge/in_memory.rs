//! In-memory keyword index implementing [`KnowledgeSearchPort`].
//!
//! Stands in for the external retrieval pipeline in the CLI and in tests.
//! Documents are loaded from a JSON array:
//!
//! ```json
//! [{"title": "Travel notes", "content": "...", "tags": ["travel"], "user_id": "u1"}]
//! ```
//!
//! A document without `user_id` is visible to every user.

use std::collections::HashSet;
use std::path::Path;

use aion_application::ports::knowledge_search::{
    KnowledgeHit, KnowledgeSearchError, KnowledgeSearchPort,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeLoadError {
    #[error("Failed to read documents file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse documents file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl KnowledgeDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            user_id: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    fn visible_to(&self, user_id: Option<&str>) -> bool {
        match (&self.user_id, user_id) {
            (None, _) => true,
            (Some(owner), Some(user)) => owner == user,
            (Some(_), None) => false,
        }
    }

    fn terms(&self) -> HashSet<String> {
        let mut all = terms(&self.title);
        all.extend(terms_of_all(&self.tags));
        all.extend(terms(&self.content));
        all
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_lowercase())
        .collect()
}

fn terms_of_all(texts: &[String]) -> HashSet<String> {
    texts.iter().flat_map(|t| terms(t)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeIndex {
    documents: Vec<KnowledgeDocument>,
}

impl InMemoryKnowledgeIndex {
    pub fn new(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, KnowledgeLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let documents: Vec<KnowledgeDocument> = serde_json::from_str(&raw)?;
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl KnowledgeSearchPort for InMemoryKnowledgeIndex {
    async fn search(
        &self,
        query: &str,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeSearchError> {
        let wanted = terms(query);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        // Score = share of distinct query terms the document contains.
        let mut hits: Vec<KnowledgeHit> = self
            .documents
            .iter()
            .filter(|doc| doc.visible_to(user_id))
            .filter_map(|doc| {
                let have = doc.terms();
                let matched = wanted.iter().filter(|t| have.contains(*t)).count();
                (matched > 0).then(|| KnowledgeHit {
                    source: doc.title.clone(),
                    content: doc.content.clone(),
                    score: matched as f64 / wanted.len() as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.source.cmp(&b.source))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
