//! Run types and required actions.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::assistant::AssistantTool;

/// Server-side lifecycle status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// One assistant-turn execution against a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
}

/// Data the client must supply before the run continues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredAction {
    SubmitToolOutputs {
        submit_tool_outputs: ToolOutputsRequest,
    },
    SubmitToolApprovals {
        submit_tool_approvals: ToolApprovalsRequest,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolOutputsRequest {
    #[serde(default)]
    pub tool_calls: Vec<FunctionCallRequest>,
}

/// A function call the client must answer with an output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionInvocation,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionInvocation {
    pub name: String,
    /// JSON-encoded arguments as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolApprovalsRequest {
    #[serde(default)]
    pub tool_approvals: Vec<ToolApprovalRequest>,
}

/// A tool execution waiting for a human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolApprovalRequest {
    pub id: String,
    pub tool_id: String,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// Output for one function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Wire decision posted back for an approval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalVerdict {
    Approve,
    Decline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolApprovalSubmission {
    pub id: String,
    pub tool_id: String,
    pub decision: ApprovalVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_outputs_action() {
        let raw = serde_json::json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "now", "arguments": "{}"}}
                    ]
                }
            }
        });
        let run: Run = serde_json::from_value(raw).unwrap();
        match run.required_action {
            Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }) => {
                assert_eq!(submit_tool_outputs.tool_calls[0].function.name, "now");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn parses_tool_approvals_action() {
        let raw = serde_json::json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_approvals",
                "submit_tool_approvals": {
                    "tool_approvals": [{"id": "ap_1", "tool_id": "web_search"}]
                }
            }
        });
        let run: Run = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            run.required_action,
            Some(RequiredAction::SubmitToolApprovals { ref submit_tool_approvals })
                if submit_tool_approvals.tool_approvals[0].tool_id == "web_search"
        ));
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Expired.is_terminal());
        assert!(!RunStatus::RequiresAction.is_terminal());
    }
}
