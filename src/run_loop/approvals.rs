//! Human approval rendezvous for externally-sensitive tools.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tracing::debug;

use super::controller::RunTicket;
use crate::error::{Result, ThreadRunError};
use crate::types::{ApprovalVerdict, ToolApprovalRequest};

/// Decision a user makes for a pending approval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Approve and remember the tool for this thread.
    Always,
    Once,
    Decline,
}

impl ApprovalDecision {
    /// Anything but a decline executes the tool.
    pub fn verdict(self) -> ApprovalVerdict {
        match self {
            Self::Decline => ApprovalVerdict::Decline,
            Self::Always | Self::Once => ApprovalVerdict::Approve,
        }
    }
}

/// The approval currently awaiting a decision.
///
/// It is published only while the run is suspended on it; once decided (or
/// withdrawn) the gate holds nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolApproval {
    pub id: String,
    pub tool_id: String,
    pub arguments: Option<serde_json::Value>,
}

impl ToolApproval {
    fn pending(request: &ToolApprovalRequest) -> Self {
        Self {
            id: request.id.clone(),
            tool_id: request.tool_id.clone(),
            arguments: request.arguments.clone(),
        }
    }
}

/// Suspends the run until a decision for exactly one approval arrives.
#[derive(Debug)]
pub struct ApprovalGate {
    pending: watch::Sender<Option<ToolApproval>>,
    responder: Mutex<Option<oneshot::Sender<ApprovalDecision>>>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(None);
        Self {
            pending,
            responder: Mutex::new(None),
        }
    }

    pub fn watch(&self) -> watch::Receiver<Option<ToolApproval>> {
        self.pending.subscribe()
    }

    pub fn pending(&self) -> Option<ToolApproval> {
        self.pending.borrow().clone()
    }

    /// Publish `request` and wait for [`decide`](Self::decide). Cancelling the
    /// run withdraws the approval and yields [`ThreadRunError::Cancelled`].
    pub async fn request(
        &self,
        request: &ToolApprovalRequest,
        ticket: &RunTicket,
    ) -> Result<ApprovalDecision> {
        let (tx, rx) = oneshot::channel();
        {
            let mut responder = self.responder.lock().unwrap_or_else(PoisonError::into_inner);
            if responder.is_some() {
                return Err(ThreadRunError::InvalidState(
                    "an approval is already pending".into(),
                ));
            }
            *responder = Some(tx);
        }
        self.pending.send_replace(Some(ToolApproval::pending(request)));
        debug!(approval_id = %request.id, tool_id = %request.tool_id, "awaiting approval");

        let decision = ticket
            .guard(async { rx.await.map_err(|_| ThreadRunError::Cancelled) })
            .await;

        self.take_responder();
        self.pending.send_replace(None);
        decision
    }

    /// Resolve the pending approval. Returns `false` when nothing is waiting.
    pub fn decide(&self, decision: ApprovalDecision) -> bool {
        match self.take_responder() {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Drop any published approval once the run that raised it is over.
    pub fn clear(&self) {
        self.take_responder();
        self.pending.send_if_modified(|p| p.take().is_some());
    }

    fn take_responder(&self) -> Option<oneshot::Sender<ApprovalDecision>> {
        self.responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
