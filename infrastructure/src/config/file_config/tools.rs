//! Tools configuration from TOML (`[tools]` section)
//!
//! ```toml
//! [tools]
//! enabled = ["calculator", "knowledge_base_search"]   # empty = everything registered
//!
//! [tools.timeouts]
//! calculator = 2
//!
//! [tools.code_runner]
//! interpreter = "python3.12"
//! timeout_secs = 10
//!
//! [tools.knowledge_base]
//! documents_path = "~/notes/knowledge.json"
//!
//! [tools.web_fetch]
//! timeout_secs = 20
//! max_chars = 4000
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tools::code_runner::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
use crate::tools::knowledge_base::DEFAULT_LIMIT;
use crate::tools::web_fetch::{
    DEFAULT_MAX_CHARS, DEFAULT_TIMEOUT as DEFAULT_FETCH_TIMEOUT,
};
use crate::tools::{CodeRunner, ToolRegistry, WebFetchTool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCodeRunnerConfig {
    pub interpreter: String,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for FileCodeRunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl FileCodeRunnerConfig {
    pub fn build(&self) -> CodeRunner {
        let mut runner = CodeRunner::new()
            .with_interpreter(&self.interpreter)
            .with_max_output_bytes(self.max_output_bytes.max(1));
        if self.timeout_secs > 0 {
            runner = runner.with_timeout(Duration::from_secs(self.timeout_secs));
        }
        runner
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileKnowledgeBaseConfig {
    /// Passages returned when the model does not ask for a count
    pub default_limit: usize,
    /// JSON array of documents loaded into the in-memory index
    pub documents_path: Option<PathBuf>,
}

impl Default for FileKnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            documents_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWebFetchConfig {
    pub timeout_secs: u64,
    /// Characters of page text handed to the model
    pub max_chars: usize,
}

impl Default for FileWebFetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl FileWebFetchConfig {
    pub fn build(&self) -> Result<WebFetchTool, reqwest::Error> {
        let timeout = if self.timeout_secs > 0 {
            Duration::from_secs(self.timeout_secs)
        } else {
            DEFAULT_FETCH_TIMEOUT
        };
        Ok(WebFetchTool::new(timeout)?.with_max_chars(self.max_chars))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Names offered to the model; empty means every registered tool
    pub enabled: Vec<String>,
    /// Per-tool timeout overrides in seconds
    pub timeouts: BTreeMap<String, u64>,
    pub code_runner: FileCodeRunnerConfig,
    pub knowledge_base: FileKnowledgeBaseConfig,
    pub web_fetch: FileWebFetchConfig,
}

impl FileToolsConfig {
    /// `None` when every registered tool is enabled.
    pub fn enabled_tools(&self) -> Option<&[String]> {
        if self.enabled.is_empty() {
            None
        } else {
            Some(self.enabled.as_slice())
        }
    }

    pub fn apply_timeouts(&self, registry: &mut ToolRegistry) {
        for (name, secs) in &self.timeouts {
            if *secs > 0 {
                registry.set_timeout(name.clone(), Duration::from_secs(*secs));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Calculator;
    use aion_domain::ToolContract;

    #[test]
    fn test_deserialize_tools_section() {
        let config: FileToolsConfig = toml::from_str(
            r#"
enabled = ["calculator"]

[timeouts]
calculator = 3

[code_runner]
interpreter = "python3.12"

[web_fetch]
max_chars = 4000
"#,
        )
        .unwrap();

        assert_eq!(config.enabled_tools(), Some(&["calculator".to_string()][..]));
        assert_eq!(config.code_runner.interpreter, "python3.12");
        assert_eq!(config.code_runner.timeout_secs, DEFAULT_TIMEOUT.as_secs());
        assert_eq!(config.knowledge_base.default_limit, DEFAULT_LIMIT);
        assert_eq!(config.web_fetch.max_chars, 4000);
        assert_eq!(config.web_fetch.timeout_secs, DEFAULT_FETCH_TIMEOUT.as_secs());
    }

    #[test]
    fn test_timeouts_reach_registry() {
        let config = FileToolsConfig {
            timeouts: BTreeMap::from([("calculator".to_string(), 7)]),
            ..Default::default()
        };
        let mut registry = ToolRegistry::new();
        registry.register(Calculator::new()).unwrap();
        config.apply_timeouts(&mut registry);

        let calculator = registry.resolve("calculator").unwrap();
        assert_eq!(
            registry.timeout_for(calculator.as_ref()),
            Duration::from_secs(7)
        );
        assert!(FileToolsConfig::default().enabled_tools().is_none());
    }

    #[test]
    fn test_code_runner_build() {
        let runner = FileCodeRunnerConfig {
            timeout_secs: 3,
            ..Default::default()
        }
        .build();
        assert!(runner.default_timeout() > Duration::from_secs(3));
    }

    #[test]
    fn test_web_fetch_build() {
        let tool = FileWebFetchConfig {
            timeout_secs: 0,
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(tool.name(), "web_fetch");
        assert!(tool.default_timeout() > DEFAULT_FETCH_TIMEOUT);
    }
}
