//! Resolves `requires_action` stops and reopens the run's stream.

use std::collections::{HashSet, VecDeque};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::approvals::{ApprovalDecision, ApprovalGate};
use super::controller::{RunController, RunTicket};
use crate::api::AssistantApi;
use crate::error::{Result, ThreadRunError};
use crate::stream::RunEventStream;
use crate::tools::ClientFunctions;
use crate::types::{
    FunctionCallRequest, RequiredAction, Run, Thread, ToolApprovalRequest, ToolApprovalSubmission,
};

/// Answers required actions for one send.
///
/// Approvals announced by the server are queued and answered one per stream
/// leg; ids already answered during this send are never asked again.
pub struct ToolActionResolver<'a> {
    api: &'a dyn AssistantApi,
    functions: &'a ClientFunctions,
    gate: &'a ApprovalGate,
    thread: &'a watch::Sender<Option<Thread>>,
    controller: &'a RunController,
    ticket: &'a RunTicket,
    queue: VecDeque<ToolApprovalRequest>,
    seen: HashSet<String>,
}

impl<'a> ToolActionResolver<'a> {
    pub fn new(
        api: &'a dyn AssistantApi,
        functions: &'a ClientFunctions,
        gate: &'a ApprovalGate,
        thread: &'a watch::Sender<Option<Thread>>,
        controller: &'a RunController,
        ticket: &'a RunTicket,
    ) -> Self {
        Self {
            api,
            functions,
            gate,
            thread,
            controller,
            ticket,
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Satisfy the action `run` stopped on and return the resumed stream.
    pub async fn resume(&mut self, thread_id: &str, run: Run) -> Result<RunEventStream> {
        let action = run.required_action.ok_or_else(|| {
            ThreadRunError::Protocol(format!("run {} requires action but names none", run.id))
        })?;
        match action {
            RequiredAction::SubmitToolOutputs {
                submit_tool_outputs,
            } => {
                self.submit_outputs(thread_id, &run.id, &submit_tool_outputs.tool_calls)
                    .await
            }
            RequiredAction::SubmitToolApprovals {
                submit_tool_approvals,
            } => {
                self.enqueue(submit_tool_approvals.tool_approvals);
                self.submit_next_approval(thread_id, &run.id).await
            }
        }
    }

    async fn submit_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        calls: &[FunctionCallRequest],
    ) -> Result<RunEventStream> {
        let outputs = self.ticket.guard(async { Ok(self.functions.resolve(calls).await) }).await?;
        self.ensure_current()?;
        debug!(run_id = %run_id, outputs = outputs.len(), "submitting tool outputs");
        self.controller.mark_fetching(self.ticket);
        self.ticket
            .guard(self.api.submit_tool_outputs_stream(thread_id, run_id, outputs))
            .await
    }

    fn enqueue(&mut self, approvals: Vec<ToolApprovalRequest>) {
        for approval in approvals {
            if self.seen.insert(approval.id.clone()) {
                self.queue.push_back(approval);
            } else {
                debug!(approval_id = %approval.id, "approval already handled");
            }
        }
    }

    async fn submit_next_approval(&mut self, thread_id: &str, run_id: &str) -> Result<RunEventStream> {
        let request = self.queue.pop_front().ok_or_else(|| {
            ThreadRunError::Protocol(format!(
                "run {run_id} requires approvals that were all answered already"
            ))
        })?;

        let decision = if self.is_approved(&request.tool_id) {
            info!(tool_id = %request.tool_id, "tool approved for this thread");
            ApprovalDecision::Once
        } else {
            self.gate.request(&request, self.ticket).await?
        };
        self.ensure_current()?;

        if decision == ApprovalDecision::Always {
            self.remember_tool(thread_id, &request.tool_id).await;
            self.ensure_current()?;
        }

        let submission = ToolApprovalSubmission {
            id: request.id,
            tool_id: request.tool_id,
            decision: decision.verdict(),
        };
        debug!(run_id = %run_id, approval_id = %submission.id, decision = %submission.decision, "submitting approval");
        self.controller.mark_fetching(self.ticket);
        self.ticket
            .guard(
                self.api
                    .submit_tool_approvals_stream(thread_id, run_id, vec![submission]),
            )
            .await
    }

    fn is_approved(&self, tool_id: &str) -> bool {
        self.thread
            .borrow()
            .as_ref()
            .is_some_and(|t| t.metadata.is_tool_approved(tool_id))
    }

    /// Write the tool into the local approved set, then push the metadata.
    /// A failed remote update leaves the local write in place.
    async fn remember_tool(&self, thread_id: &str, tool_id: &str) {
        let mut metadata = None;
        self.thread.send_if_modified(|thread| {
            let Some(thread) = thread.as_mut() else {
                return false;
            };
            if !thread.metadata.approve_tool(tool_id) {
                return false;
            }
            metadata = Some(thread.metadata.clone());
            true
        });
        let Some(metadata) = metadata else {
            return;
        };
        if let Err(err) = self.api.update_thread(thread_id, &metadata).await {
            warn!(thread_id = %thread_id, tool_id = %tool_id, error = %err, "failed to persist approved tool");
        }
    }

    fn ensure_current(&self) -> Result<()> {
        if self.controller.is_current(self.ticket) {
            Ok(())
        } else {
            Err(ThreadRunError::Cancelled)
        }
    }
}
