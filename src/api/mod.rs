//! Collaborator seam for the remote run service.
//!
//! The session talks to threads, messages and runs exclusively through
//! [`AssistantApi`]. [`HttpAssistantApi`] is the HTTP implementation; tests
//! substitute scripted implementations.

pub mod client;
pub mod http;

pub use client::HttpAssistantApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::RunEventStream;
use crate::types::{
    AssistantTool, FileAttachment, MessageRecord, MessageRole, Run, Thread, ThreadMetadata,
    ToolApprovalSubmission, ToolOutput, ToolResources,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateThreadRequest {
    pub metadata: ThreadMetadata,
    #[serde(default, skip_serializing_if = "ToolResources::is_empty")]
    pub tool_resources: ToolResources,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageRequest {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<FileAttachment>,
}

impl CreateMessageRequest {
    pub fn user(content: impl Into<String>, attachments: Vec<FileAttachment>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            attachments,
        }
    }
}

/// Body of the streaming run-creation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub tools: Vec<AssistantTool>,
    /// Tool ids that must be approved by the user before they execute.
    pub required_approvals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

/// Remote operations the run engine depends on.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread>;

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread>;

    async fn update_thread(&self, thread_id: &str, metadata: &ThreadMetadata) -> Result<Thread>;

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<MessageRecord>;

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<MessageRecord>>;

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()>;

    /// Create a run and open its event stream.
    async fn create_run_stream(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<RunEventStream>;

    /// Submit function outputs and reopen the run's event stream.
    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream>;

    /// Submit approval decisions and reopen the run's event stream.
    async fn submit_tool_approvals_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: Vec<ToolApprovalSubmission>,
    ) -> Result<RunEventStream>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;
}
