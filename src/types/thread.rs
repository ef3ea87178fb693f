//! Thread and thread metadata types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const TITLE_KEY: &str = "title";
pub const ASSISTANT_KEY: &str = "assistant_id";
pub const APPROVED_TOOLS_KEY: &str = "approved_tools";

/// A persisted conversation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub metadata: ThreadMetadata,
    #[serde(default)]
    pub tool_resources: ToolResources,
}

/// Opaque metadata bag attached to a thread.
///
/// The server stores a flat string map; structured values such as the
/// approved tool set are JSON-encoded into a single entry. Unknown keys are
/// round-tripped verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ThreadMetadata(BTreeMap<String, String>);

impl ThreadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed metadata for a freshly created thread.
    pub fn seeded(title: impl Into<String>, assistant_id: Option<&str>) -> Self {
        let mut meta = Self::new();
        meta.0.insert(TITLE_KEY.to_string(), title.into());
        if let Some(id) = assistant_id {
            meta.0.insert(ASSISTANT_KEY.to_string(), id.to_string());
        }
        meta.set_approved_tools(&BTreeSet::new());
        meta
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.get(TITLE_KEY)
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.get(ASSISTANT_KEY)
    }

    /// Tool ids the user approved with "always" for this thread.
    ///
    /// A missing or malformed entry reads as the empty set.
    pub fn approved_tools(&self) -> BTreeSet<String> {
        self.get(APPROVED_TOOLS_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn is_tool_approved(&self, tool_id: &str) -> bool {
        self.approved_tools().contains(tool_id)
    }

    pub fn set_approved_tools(&mut self, tools: &BTreeSet<String>) {
        let ids: Vec<&String> = tools.iter().collect();
        let encoded = serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string());
        self.0.insert(APPROVED_TOOLS_KEY.to_string(), encoded);
    }

    /// Add a tool id to the approved set. Returns `false` if it was already present.
    pub fn approve_tool(&mut self, tool_id: &str) -> bool {
        let mut tools = self.approved_tools();
        let inserted = tools.insert(tool_id.to_string());
        if inserted {
            self.set_approved_tools(&tools);
        }
        inserted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Resources made available to the assistant's tools on this thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_search: Option<FileSearchResources>,
}

impl ToolResources {
    /// Resources referencing the given knowledge stores, or empty if none.
    pub fn with_knowledge_stores(ids: Vec<String>) -> Self {
        if ids.is_empty() {
            return Self::default();
        }
        Self {
            file_search: Some(FileSearchResources {
                vector_store_ids: ids,
            }),
        }
    }

    pub fn knowledge_store_ids(&self) -> &[String] {
        self.file_search
            .as_ref()
            .map(|fs| fs.vector_store_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge_store_ids().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}
