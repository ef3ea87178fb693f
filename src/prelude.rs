//! Convenience re-exports for common use.

pub use crate::api::{AssistantApi, HttpAssistantApi};
pub use crate::config::{EngineConfig, FeatureFlags};
pub use crate::error::{Result, ThreadRunError};
pub use crate::run_loop::{ApprovalDecision, ControllerStatus, ToolApproval};
pub use crate::session::{ChatSession, SendOptions, SendOutcome, SessionHooks, SessionNotice};
pub use crate::tools::{ClientFunction, ClientFunctions, FunctionTool};
pub use crate::types::{
    Assistant, AssistantTool, ChatMessage, FileAttachment, Plan, Run, Step, Thread,
    ThreadMetadata, ToolCallKind,
};
