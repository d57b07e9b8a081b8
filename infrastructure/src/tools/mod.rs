//! Tool implementations and the registry that dispatches them.
//!
//! | Tool | Module | Default timeout |
//! |------|--------|-----------------|
//! | `calculator` | [`calculator`] | 2s |
//! | `code_runner` | [`code_runner`] | 12s |
//! | `knowledge_base_search` | [`knowledge_base`] | 15s |
//! | `web_fetch` | [`web_fetch`] | request timeout + 5s |
//! | `{server}__{tool}` | [`crate::protocol::remote_tool`] | server timeout |

pub mod calculator;
pub mod code_runner;
pub mod knowledge_base;
pub mod registry;
pub mod schema;
pub mod web_fetch;

pub use calculator::{CALCULATOR, Calculator};
pub use code_runner::{CODE_RUNNER, CodeRunner};
pub use knowledge_base::{KNOWLEDGE_BASE_SEARCH, KnowledgeBaseTool};
pub use registry::{RegistryError, ToolRegistry};
pub use schema::FunctionSchemaConverter;
pub use web_fetch::{WEB_FETCH, WebFetchTool};
