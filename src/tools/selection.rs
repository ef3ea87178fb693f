//! Effective tool set for a run.

use std::collections::BTreeSet;

use crate::config::FeatureFlags;
use crate::types::{
    Assistant, AssistantTool, FileAttachment, ThreadMetadata, ToolCallKind, FILE_SEARCH_TOOL_ID,
};

pub const WEB_SEARCH_TOOL_ID: &str = "web_search";
pub const IMAGE_GENERATION_TOOL_ID: &str = "image_generation";

/// Tools and approval requirements computed for one send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSelection {
    pub tools: Vec<AssistantTool>,
    /// External tools the user has not yet approved for this thread.
    pub required_approvals: Vec<String>,
    /// Knowledge stores referenced by attachments but unknown to the assistant.
    pub extra_knowledge_stores: Vec<String>,
}

/// Compute the tool set: assistant tools, then file search when attachments
/// bring a knowledge store the assistant lacks, then flag-gated capability
/// tools. Duplicate ids keep their first occurrence.
pub fn select_tools(
    assistant: &Assistant,
    attachments: &[FileAttachment],
    features: FeatureFlags,
    metadata: &ThreadMetadata,
) -> ToolSelection {
    let mut tools: Vec<AssistantTool> = Vec::new();
    let mut push = |tool: AssistantTool| {
        if !tools.iter().any(|t| t.id == tool.id) {
            tools.push(tool);
        }
    };

    for tool in &assistant.tools {
        push(tool.clone());
    }

    let mut extra_knowledge_stores = Vec::new();
    for store in attachments
        .iter()
        .filter_map(|a| a.knowledge_store_id.as_deref())
    {
        let known = assistant.knowledge_store_ids.iter().any(|id| id == store);
        if !known && !extra_knowledge_stores.iter().any(|id| id == store) {
            extra_knowledge_stores.push(store.to_string());
        }
    }
    if !extra_knowledge_stores.is_empty() && !assistant.has_tool(FILE_SEARCH_TOOL_ID) {
        push(AssistantTool::file_search());
    }

    if features.web_search {
        push(AssistantTool::new(WEB_SEARCH_TOOL_ID, ToolCallKind::System).external());
    }
    if features.image_generation {
        push(AssistantTool::new(IMAGE_GENERATION_TOOL_ID, ToolCallKind::System));
    }

    let approved: BTreeSet<String> = metadata.approved_tools();
    let required_approvals = tools
        .iter()
        .filter(|t| t.external && !approved.contains(&t.id))
        .map(|t| t.id.clone())
        .collect();

    ToolSelection {
        tools,
        required_approvals,
        extra_knowledge_stores,
    }
}
