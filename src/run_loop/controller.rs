//! Lifecycle status of the active run and its cancellation handle.

use std::future::Future;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ThreadRunError};

/// Controller status as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No run in flight; sends are accepted.
    Ready,
    /// A stream is open and frames are being applied.
    Fetching,
    /// The run requires client action (tool output or approval).
    Waiting,
    /// Cancellation requested; cleanup in progress.
    Aborting,
}

/// Observable controller state.
#[derive(Debug, Clone)]
pub struct ControllerState {
    status: ControllerStatus,
    run_id: Option<String>,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl ControllerState {
    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    /// Server id of the active run, once a run frame announced it.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }
}

/// Proof of ownership of the single in-flight run.
///
/// Every mutation after a suspension point goes through a ticket; a ticket
/// from an aborted or superseded run no longer matches and its writes are
/// dropped.
#[derive(Debug, Clone)]
pub struct RunTicket {
    generation: u64,
    token: CancellationToken,
}

impl RunTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested for this run.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Await `fut` unless the run is cancelled first, in which case the
    /// future is dropped (aborting its transport) and `Cancelled` returned.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ThreadRunError::Cancelled),
            out = fut => out,
        }
    }
}

/// Single-flight run state machine for one conversation.
#[derive(Debug)]
pub struct RunController {
    state: watch::Sender<ControllerState>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ControllerState {
            status: ControllerStatus::Ready,
            run_id: None,
            generation: 0,
            cancel: None,
        });
        Self { state }
    }

    pub fn status(&self) -> ControllerStatus {
        self.state.borrow().status
    }

    pub fn run_id(&self) -> Option<String> {
        self.state.borrow().run_id.clone()
    }

    /// Subscribe to status/run-id changes.
    pub fn watch(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Ready → Fetching. Returns `None` (no side effects) when a run is
    /// already in flight.
    pub fn try_begin(&self) -> Option<RunTicket> {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            if state.status != ControllerStatus::Ready {
                return false;
            }
            let token = CancellationToken::new();
            state.generation += 1;
            state.status = ControllerStatus::Fetching;
            state.run_id = None;
            state.cancel = Some(token.clone());
            ticket = Some(RunTicket {
                generation: state.generation,
                token,
            });
            true
        });
        if ticket.is_some() {
            debug!(status = ?ControllerStatus::Fetching, "run controller transition");
        }
        ticket
    }

    /// Whether `ticket` still owns the controller and was not cancelled.
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        !ticket.is_cancelled() && self.state.borrow().generation == ticket.generation
    }

    /// Remember the server run id so cancellation can reach it.
    pub fn record_run_id(&self, ticket: &RunTicket, run_id: &str) {
        self.state.send_if_modified(|state| {
            if state.generation != ticket.generation || ticket.is_cancelled() {
                return false;
            }
            if state.run_id.as_deref() == Some(run_id) {
                return false;
            }
            state.run_id = Some(run_id.to_string());
            true
        });
    }

    /// Fetching → Waiting, persisting the run id of the required action.
    pub fn mark_waiting(&self, ticket: &RunTicket, run_id: &str) -> bool {
        self.transition(ticket, ControllerStatus::Fetching, ControllerStatus::Waiting, Some(run_id))
    }

    /// Waiting → Fetching once the action is resolved and a new stream opens.
    pub fn mark_fetching(&self, ticket: &RunTicket) -> bool {
        self.transition(ticket, ControllerStatus::Waiting, ControllerStatus::Fetching, None)
    }

    fn transition(
        &self,
        ticket: &RunTicket,
        from: ControllerStatus,
        to: ControllerStatus,
        run_id: Option<&str>,
    ) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.generation != ticket.generation
                || ticket.is_cancelled()
                || state.status != from
            {
                return false;
            }
            state.status = to;
            if let Some(id) = run_id {
                state.run_id = Some(id.to_string());
            }
            true
        });
        if changed {
            debug!(?from, ?to, "run controller transition");
        }
        changed
    }

    /// Request cancellation of the in-flight run: any active state → Aborting
    /// and the transport is signalled. Returns `false` when nothing was running.
    pub fn abort(&self) -> bool {
        let mut token = None;
        self.state.send_if_modified(|state| {
            if matches!(
                state.status,
                ControllerStatus::Ready | ControllerStatus::Aborting
            ) {
                return false;
            }
            state.status = ControllerStatus::Aborting;
            token = state.cancel.clone();
            true
        });
        match token {
            Some(token) => {
                debug!(status = ?ControllerStatus::Aborting, "run controller transition");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Back to Ready after the run's cleanup. A stale ticket cannot reset a
    /// newer run.
    pub fn finish(&self, ticket: &RunTicket) {
        let changed = self.state.send_if_modified(|state| {
            if state.generation != ticket.generation || state.status == ControllerStatus::Ready {
                return false;
            }
            state.status = ControllerStatus::Ready;
            state.run_id = None;
            state.cancel = None;
            true
        });
        if changed {
            debug!(status = ?ControllerStatus::Ready, "run controller transition");
        }
    }
}
