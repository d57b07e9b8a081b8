//! Knowledge lookup tool: knowledge_base_search
//!
//! Thin adapter from the tool contract to a [`KnowledgeSearchPort`]. The
//! end user is taken from the [`ToolContext`], never from model arguments.

use std::sync::Arc;
use std::time::Duration;

use aion_application::ports::knowledge_search::KnowledgeSearchPort;
use aion_domain::util::truncate_str;
use aion_domain::{
    ArgumentsExt, ParamType, ToolArguments, ToolContext, ToolContract, ToolDefinition, ToolError,
    ToolParameter,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

/// Tool name constant
pub const KNOWLEDGE_BASE_SEARCH: &str = "knowledge_base_search";

/// Results returned when the model does not ask for a specific number.
pub const DEFAULT_LIMIT: usize = 5;

const MAX_LIMIT: usize = 20;

/// Passage preview length sent back to the model.
const PREVIEW_BYTES: usize = 500;

pub struct KnowledgeBaseTool {
    definition: ToolDefinition,
    search: Arc<dyn KnowledgeSearchPort>,
    default_limit: usize,
}

impl KnowledgeBaseTool {
    pub fn new(search: Arc<dyn KnowledgeSearchPort>) -> Self {
        Self {
            definition: ToolDefinition::new(
                KNOWLEDGE_BASE_SEARCH,
                "Search the user's knowledge base (stored notes, facts and uploaded documents). \
                 Use it to find information the user shared earlier. Returns the most relevant \
                 passages.",
            )
            .with_parameter(ToolParameter::new(
                "query",
                "What to look for in the knowledge base",
                true,
            ))
            .with_parameter(
                ToolParameter::new(
                    "max_results",
                    "Maximum number of passages to return (default: 5)",
                    false,
                )
                .with_type(ParamType::Integer),
            ),
            search,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }
}

#[async_trait]
impl ToolContract for KnowledgeBaseTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn execute(&self, args: &ToolArguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = args
            .require_string("query")
            .map_err(ToolError::invalid_argument)?;
        let limit = args
            .get_i64("max_results")
            .map(|n| n.clamp(1, MAX_LIMIT as i64) as usize)
            .unwrap_or(self.default_limit);

        let hits = self
            .search
            .search(query, ctx.user_id.as_deref(), limit)
            .await
            .map_err(|e| ToolError::execution(format!("Knowledge base search failed: {}", e)))?;

        info!(query, limit, found = hits.len(), "Knowledge base searched");

        let results: Vec<Value> = hits
            .iter()
            .map(|hit| {
                let preview = truncate_str(&hit.content, PREVIEW_BYTES);
                let content = if preview.len() < hit.content.len() {
                    format!("{}...", preview)
                } else {
                    hit.content.clone()
                };
                json!({
                    "source": hit.source,
                    "content": content,
                    "relevance": (hit.score * 1000.0).round() / 1000.0,
                })
            })
            .collect();

        Ok(json!({
            "total_results": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_application::ports::knowledge_search::{KnowledgeHit, KnowledgeSearchError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSearch {
        calls: Mutex<Vec<(String, Option<String>, usize)>>,
        fail: bool,
    }

    #[async_trait]
    impl KnowledgeSearchPort for RecordingSearch {
        async fn search(
            &self,
            query: &str,
            user_id: Option<&str>,
            limit: usize,
        ) -> Result<Vec<KnowledgeHit>, KnowledgeSearchError> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), user_id.map(String::from), limit));
            if self.fail {
                return Err(KnowledgeSearchError::Unavailable("index offline".into()));
            }
            Ok(vec![KnowledgeHit {
                source: "Travel notes".into(),
                content: "x".repeat(800),
                score: 0.87654,
            }])
        }
    }

    #[tokio::test]
    async fn test_search_uses_context_user_and_limit() {
        let search = Arc::new(RecordingSearch::default());
        let tool = KnowledgeBaseTool::new(search.clone());
        let args: ToolArguments = [
            ("query".to_string(), json!("passport")),
            ("max_results".to_string(), json!(3)),
        ]
        .into();

        let out = tool
            .execute(&args, &ToolContext::for_user("user-42"))
            .await
            .unwrap();

        assert_eq!(
            search.calls.lock().unwrap()[0],
            ("passport".to_string(), Some("user-42".to_string()), 3)
        );
        assert_eq!(out["total_results"], json!(1));
        assert_eq!(out["results"][0]["relevance"], json!(0.877));
        let content = out["results"][0]["content"].as_str().unwrap();
        assert_eq!(content.len(), PREVIEW_BYTES + 3);
    }

    #[tokio::test]
    async fn test_limit_defaults_and_clamps() {
        let search = Arc::new(RecordingSearch::default());
        let tool = KnowledgeBaseTool::new(search.clone());

        let args: ToolArguments = [("query".to_string(), json!("q"))].into();
        tool.execute(&args, &ToolContext::default()).await.unwrap();

        let args: ToolArguments = [
            ("query".to_string(), json!("q")),
            ("max_results".to_string(), json!(500)),
        ]
        .into();
        tool.execute(&args, &ToolContext::default()).await.unwrap();

        let calls = search.calls.lock().unwrap();
        assert_eq!(calls[0].2, DEFAULT_LIMIT);
        assert_eq!(calls[1].2, MAX_LIMIT);
    }

    #[tokio::test]
    async fn test_backend_failure_is_execution_error() {
        let search = Arc::new(RecordingSearch {
            fail: true,
            ..Default::default()
        });
        let tool = KnowledgeBaseTool::new(search);
        let args: ToolArguments = [("query".to_string(), json!("q"))].into();

        let err = tool.execute(&args, &ToolContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("index offline"));
    }
}
