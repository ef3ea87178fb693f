//! Assistant binding and tool definitions.

use serde::{Deserialize, Serialize};

use super::plan::ToolCallKind;

pub const FILE_SEARCH_TOOL_ID: &str = "file_search";

/// A tool enabled for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantTool {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    /// Externally-sensitive tools need a human approval before they run.
    #[serde(default)]
    pub external: bool,
}

impl AssistantTool {
    pub fn new(id: impl Into<String>, kind: ToolCallKind) -> Self {
        Self {
            id: id.into(),
            kind,
            external: false,
        }
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn file_search() -> Self {
        Self::new(FILE_SEARCH_TOOL_ID, ToolCallKind::FileSearch)
    }
}

/// The assistant a thread is bound to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
    /// Knowledge stores already attached to the assistant itself.
    #[serde(default)]
    pub knowledge_store_ids: Vec<String>,
}

impl Assistant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<AssistantTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_knowledge_stores(mut self, ids: Vec<String>) -> Self {
        self.knowledge_store_ids = ids;
        self
    }

    pub fn has_tool(&self, id: &str) -> bool {
        self.tools.iter().any(|t| t.id == id)
    }
}

/// A file attached to a user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAttachment {
    pub file_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Knowledge store the file was embedded into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_store_id: Option<String>,
}
